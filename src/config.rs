use core::time::Duration;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde::Deserialize;

pub mod constants {
    use core::time::Duration;

    macro_rules! env_or_default {
        ($name:expr, $default:expr) => {
            if let Some(s) = option_env!($name) {
                s
            } else {
                $default
            }
        };
    }

    pub const LOGIN_URL: &str = env_or_default!(
        "ESF_LOGIN_URL",
        "https://www.formulastudent.de/l/?redirect_url=%2F"
    );
    pub const LIST_URL: &str = env_or_default!("ESF_LIST_URL", "https://www.formulastudent.de/esf");
    pub const OUTPUT: &str = env_or_default!("ESF_OUTPUT", "esf");

    pub const USER_FIELD: &str = "user";
    pub const PASSWORD_FIELD: &str = "pass";
    pub const SUBMIT: &str = "submit";
    pub const LOGIN_MARKER: &str = "#c2106";
    pub const ITEM_CALLBACK: &str = "showItem({id});";

    pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
    pub const DIALOG_POLL: Duration = Duration::from_millis(200);
}

/// Everything the bot needs besides credentials. Every field has a default,
/// so a JSON config file only has to name what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub login_url: String,
    pub list_url: String,
    pub user_field: String,
    pub password_field: String,
    /// `name` attribute of the submit control, on the login page as well as
    /// on every form page.
    pub submit: String,
    /// CSS selector that only matches once the login went through.
    pub login_marker: String,
    /// Script that reveals one numbered item; `{id}` is substituted.
    pub item_callback: String,
    #[serde(with = "millis")]
    pub wait_timeout: Duration,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    #[serde(with = "millis")]
    pub dialog_poll: Duration,
    #[serde(with = "millis")]
    pub dialog_budget: Duration,
    /// Directory the files of this run are written to.
    pub output_dir: PathBuf,
    pub headless: bool,
    pub chrome: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        use constants::{
            DIALOG_POLL, ITEM_CALLBACK, LIST_URL, LOGIN_MARKER, LOGIN_URL, OUTPUT, PASSWORD_FIELD,
            POLL_INTERVAL, SUBMIT, USER_FIELD, WAIT_TIMEOUT,
        };

        Self {
            login_url: LOGIN_URL.to_owned(),
            list_url: LIST_URL.to_owned(),
            user_field: USER_FIELD.to_owned(),
            password_field: PASSWORD_FIELD.to_owned(),
            submit: SUBMIT.to_owned(),
            login_marker: LOGIN_MARKER.to_owned(),
            item_callback: ITEM_CALLBACK.to_owned(),
            wait_timeout: WAIT_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            dialog_poll: DIALOG_POLL,
            dialog_budget: WAIT_TIMEOUT,
            output_dir: PathBuf::from(OUTPUT),
            headless: false,
            chrome: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(Into::into)
    }

    pub fn item_callback(&self, id: u32) -> String {
        self.item_callback.replace("{id}", &id.to_string())
    }

    pub fn submit_selector(&self) -> String {
        format!("[name=\"{}\"]", self.submit)
    }
}

/// Per-run output directory: `root/<timestamp>`, stamped once at startup.
pub fn run_directory(root: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    root.join(stamp.to_string())
}

/// Newest run directory below `root`. Timestamps sort by name.
pub fn latest_run(root: &Path) -> anyhow::Result<PathBuf> {
    let mut runs = std::fs::read_dir(root)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    runs.retain(|path| path.is_dir());
    runs.into_iter()
        .max()
        .ok_or_else(|| anyhow::anyhow!("no runs below {}", root.display()))
}

mod millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        u64::deserialize(de).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "wait_timeout": 1500, "headless": true }"#).unwrap();
        assert_eq!(config.wait_timeout, Duration::from_millis(1500));
        assert!(config.headless);
        assert_eq!(config.login_marker, "#c2106");
        assert_eq!(config.dialog_poll, Duration::from_millis(200));
    }

    #[test]
    fn item_callback_substitutes_id() {
        let config = Config::default();
        assert_eq!(config.item_callback(3042), "showItem(3042);");
        assert_eq!(config.submit_selector(), "[name=\"submit\"]");
    }

    #[test]
    fn latest_run_picks_newest_directory() {
        let root = tempfile::tempdir().unwrap();
        assert!(latest_run(root.path()).is_err());

        for run in ["20240101-090000", "20240315-120000", "20231231-235959"] {
            std::fs::create_dir(root.path().join(run)).unwrap();
        }
        std::fs::write(root.path().join("zz.csv"), "").unwrap();
        assert_eq!(latest_run(root.path()).unwrap(), root.path().join("20240315-120000"));
    }

    #[test]
    fn run_directory_is_below_root() {
        let dir = run_directory(Path::new("out"));
        assert_eq!(dir.parent(), Some(Path::new("out")));
    }
}
