use std::{ops::RangeInclusive, path::PathBuf};

use esf::{
    bot::Bot,
    config::{Config, run_directory},
    login::Credentials,
    scrape::Chrome,
};

#[derive(clap::Parser)]
#[command(version, about = "Download ESF forms from the FSG members area as CSV")]
struct Args {
    /// User to log in to the FSG website
    #[arg(short, long, env = "ESF_USER")]
    user: String,
    /// Password to log in to the FSG website
    #[arg(short, long, env = "ESF_PASSWORD", hide_env_values = true)]
    password: String,
    /// JSON file overriding the built-in settings
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Root directory; every run writes into a timestamped subdirectory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Download numbered items (`3042`, `3000..4000`, `3000..=3999`)
    /// instead of the listed forms
    #[arg(long, value_name = "RANGE", value_parser = parse_items)]
    items: Option<RangeInclusive<u32>>,
    #[arg(long)]
    headless: bool,
    /// Chrome executable to drive
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,
}

fn parse_items(s: &str) -> Result<RangeInclusive<u32>, String> {
    let num = |x: &str| x.trim().parse::<u32>().map_err(|e| format!("{x:?}: {e}"));

    if let Some((start, end)) = s.split_once("..=") {
        Ok(num(start)?..=num(end)?)
    } else if let Some((start, end)) = s.split_once("..") {
        let (start, end) = (num(start)?, num(end)?);
        if end <= start {
            return Err(format!("empty range {s:?}"));
        }
        Ok(start..=end - 1)
    } else {
        let id = num(s)?;
        Ok(id..=id)
    }
}

async fn run(
    bot: &Bot<Chrome>,
    credentials: &Credentials,
    items: Option<RangeInclusive<u32>>,
) -> anyhow::Result<()> {
    tracing::info!(target: "main", "Logging in...");
    bot.login(credentials).await?;

    tracing::info!(target: "main", "Getting esf...");
    let written = match items {
        Some(ids) => bot.get_all_esf_to_csv(ids).await?,
        None => bot.get_esf_to_csv().await?,
    };

    tracing::info!(
        target: "main",
        "Done! {} files in \x1b[36m{}\x1b[0m",
        written.len(),
        bot.config().output_dir.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    config.output_dir = run_directory(&config.output_dir);
    config.headless |= args.headless;
    if args.chrome.is_some() {
        config.chrome = args.chrome;
    }

    let credentials = Credentials {
        user: args.user,
        password: args.password,
    };

    let driver = Chrome::launch(config.headless, config.chrome.clone())?;
    let bot = Bot::new(driver, config);

    let outcome = tokio::select! {
        r = run(&bot, &credentials, args.items) => r,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("user requested exit")),
    };
    if let Err(e) = outcome {
        tracing::error!(target: "main", "\x1b[31m[!] {e:#}\x1b[0m");
    }

    bot.exit().await
}

#[cfg(test)]
mod tests {
    use super::parse_items;

    #[test]
    fn item_ranges() {
        assert_eq!(parse_items("3042"), Ok(3042..=3042));
        assert_eq!(parse_items("3000..4000"), Ok(3000..=3999));
        assert_eq!(parse_items("1..=2"), Ok(1..=2));
        assert!(parse_items("5..5").is_err());
        assert!(parse_items("x..3").is_err());
    }
}
