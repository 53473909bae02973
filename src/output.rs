use std::{
    fs,
    path::{Path, PathBuf},
};

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::{
    esf::{FormSection, Row},
    util::file_stem,
};

pub const EXTENSION: &str = "csv";

/// Text dump of titled blocks: a quoted title line, the block's rows as
/// fully quoted CSV records, then an empty line.
#[derive(Debug, Default)]
pub struct Dump {
    buf: String,
}

impl Dump {
    /// One CSV record; an empty row is an empty line.
    pub fn record<I>(&mut self, cells: I) -> anyhow::Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut cells = cells.into_iter().peekable();
        if cells.peek().is_none() {
            self.blank();
            return Ok(());
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .flexible(true)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(cells)?;
        let bytes = writer.into_inner().map_err(csv::IntoInnerError::into_error)?;
        self.buf.push_str(&String::from_utf8(bytes)?);
        Ok(())
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub fn block(&mut self, title: &str, rows: &[Row]) -> anyhow::Result<()> {
        self.record([title])?;
        for row in rows {
            self.record(row)?;
        }
        self.blank();
        Ok(())
    }

    pub fn sections(&mut self, sections: &[FormSection]) -> anyhow::Result<()> {
        for section in sections {
            self.block(&section.name, section.data.as_deref().unwrap_or_default())?;
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Writes `contents` to `dir/<name>.csv`, creating `dir` on the way.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{EXTENSION}", file_stem(name)));
    fs::write(&path, contents)?;
    tracing::info!(target: "output", "wrote \x1b[36m{}\x1b[0m", path.display());
    Ok(path)
}

/// Concatenates every regular file of `dir` (not recursing, file-name order)
/// into `dir/out_name`, each headed by its quoted file stem. A previous
/// merge result in `dir` is left out.
pub fn merge_dir(dir: &Path, out_name: &str) -> anyhow::Result<PathBuf> {
    let target = dir.join(out_name);

    let mut files = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    files.retain(|path| path.is_file() && *path != target);
    files.sort();

    let mut dump = Dump::default();
    for path in &files {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        tracing::info!(target: "merge", "{name}");

        let data = fs::read_to_string(path)?;
        dump.record([&*name])?;
        dump.buf.push_str(&data);
        if !data.ends_with('\n') {
            dump.blank();
        }
        dump.blank();
    }

    fs::write(&target, dump.as_str())?;
    tracing::info!(target: "merge", "merged {} files into \x1b[36m{}\x1b[0m", files.len(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|&c| c.to_owned()).collect()
    }

    #[test]
    fn block_layout() {
        let mut dump = Dump::default();
        dump.block(
            "Brakes",
            &[row(&["h1", "h2", "v1", "v2"]), Row::new(), row(&["Pedal box"])],
        )
        .unwrap();
        assert_eq!(
            dump.as_str(),
            "\"Brakes\"\n\"h1\",\"h2\",\"v1\",\"v2\"\n\n\"Pedal box\"\n\n"
        );
    }

    #[test]
    fn empty_section_is_title_and_blank_line() {
        let mut dump = Dump::default();
        dump.sections(&[FormSection::new("Empty".to_owned(), String::new())])
            .unwrap();
        assert_eq!(dump.into_string(), "\"Empty\"\n\n");
    }

    #[test]
    fn quotes_and_commas_are_escaped() {
        let mut dump = Dump::default();
        dump.record(["say \"hi\"", "a,b", ""]).unwrap();
        assert_eq!(dump.as_str(), "\"say \"\"hi\"\"\",\"a,b\",\"\"\n");
    }

    #[test]
    fn merge_concatenates_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("B.csv"), "\"s\"\n\"2\"\n\n").unwrap();
        fs::write(dir.path().join("A.csv"), "\"s\"\n\"1\"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("esf.csv"), "stale").unwrap();

        let merged = merge_dir(dir.path(), "esf.csv").unwrap();
        let text = fs::read_to_string(merged).unwrap();
        assert_eq!(text, "\"A\"\n\"s\"\n\"1\"\n\n\"B\"\n\"s\"\n\"2\"\n\n\n");
    }

    #[test]
    fn write_file_keeps_name_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir.path().join("run"), "Brakes/Pedals", "x").unwrap();
        assert_eq!(path, dir.path().join("run").join("Brakes_Pedals.csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "x");
    }
}
