use std::path::{Path, PathBuf};

use esf::config::{constants::OUTPUT, latest_run};

#[derive(clap::Parser)]
#[command(version, about = "Concatenate downloaded ESF files into one")]
struct Args {
    /// Directory holding the downloaded files [default: newest run below the output root]
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,
    /// Name of the merged file, written into DIR
    #[arg(short, long, default_value = "esf.csv")]
    output: String,
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let dir = match args.dir {
        Some(dir) => dir,
        None => latest_run(Path::new(OUTPUT))?,
    };
    esf::output::merge_dir(&dir, &args.output)?;

    Ok(())
}
