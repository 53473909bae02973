use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    path::Path,
    time::Duration,
};

use esf::{
    config::Config,
    scrape::{Driver, HISTORY_BACK},
};

pub const LOGIN_URL: &str = "fake://login";
pub const LIST_URL: &str = "fake://esf";

enum Effect {
    Back,
    Push(String),
    Replace(String),
}

/// Browser stand-in: pages keyed by URL, and by the script that brings them
/// up. Unknown scripts leave the page alone.
///
/// With a lag, navigation and dispatched scripts land only after that many
/// page reads, and scripts sent while one is in flight are lost.
#[derive(Default)]
pub struct FakeDriver {
    pages: HashMap<String, String>,
    navigations: HashMap<String, String>,
    reveals: HashMap<String, String>,
    alerts: HashSet<String>,
    current: RefCell<String>,
    history: RefCell<Vec<String>>,
    dialog: Cell<bool>,
    lag: usize,
    pending: RefCell<Option<(usize, Effect)>>,
    pub executed: RefCell<Vec<String>>,
    pub dialogs_accepted: Cell<usize>,
}

#[allow(dead_code)]
impl FakeDriver {
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_owned(), html.to_owned());
        self
    }

    /// `script` loads `html` as a new history entry.
    pub fn navigation(mut self, script: &str, html: &str) -> Self {
        self.navigations.insert(script.to_owned(), html.to_owned());
        self
    }

    /// `script` swaps the page content in place.
    pub fn reveal(mut self, script: &str, html: &str) -> Self {
        self.reveals.insert(script.to_owned(), html.to_owned());
        self
    }

    pub fn alert(mut self, script: &str) -> Self {
        self.alerts.insert(script.to_owned());
        self
    }

    pub fn lagging(mut self, reads: usize) -> Self {
        self.lag = reads;
        self
    }

    fn push(&self, html: &str) {
        let previous = self.current.replace(html.to_owned());
        self.history.borrow_mut().push(previous);
    }

    fn apply(&self, effect: Effect) {
        match effect {
            Effect::Back => {
                if let Some(previous) = self.history.borrow_mut().pop() {
                    self.current.replace(previous);
                }
            }
            Effect::Push(html) => self.push(&html),
            Effect::Replace(html) => {
                self.current.replace(html);
            }
        }
    }

    fn run(&self, script: &str, queued: bool) {
        self.executed.borrow_mut().push(script.to_owned());
        if self.pending.borrow().is_some() {
            return;
        }
        if self.alerts.contains(script) {
            self.dialog.set(true);
        }

        let effect = if script == HISTORY_BACK {
            Effect::Back
        } else if let Some(html) = self.navigations.get(script) {
            Effect::Push(html.clone())
        } else if let Some(html) = self.reveals.get(script) {
            Effect::Replace(html.clone())
        } else {
            return;
        };

        let deferred = self.lag > 0 && (queued || !matches!(effect, Effect::Replace(_)));
        if deferred {
            self.pending.replace(Some((self.lag, effect)));
        } else {
            self.apply(effect);
        }
    }

    pub fn executed(&self, script: &str) -> bool {
        self.executed.borrow().iter().any(|s| s == script)
    }
}

impl Driver for FakeDriver {
    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| anyhow::anyhow!("404 {url}"))?;
        self.push(html);
        Ok(())
    }

    async fn execute(&self, script: &str) -> anyhow::Result<()> {
        self.run(script, false);
        Ok(())
    }

    async fn dispatch(&self, script: &str) -> anyhow::Result<()> {
        self.run(script, true);
        Ok(())
    }

    async fn page_source(&self) -> anyhow::Result<String> {
        let due = match &mut *self.pending.borrow_mut() {
            Some((left, _)) => {
                *left -= 1;
                *left == 0
            }
            None => false,
        };
        if due && let Some((_, effect)) = self.pending.take() {
            self.apply(effect);
        }
        Ok(self.current.borrow().clone())
    }

    async fn accept_dialog(&self) -> anyhow::Result<bool> {
        let open = self.dialog.replace(false);
        if open {
            self.dialogs_accepted.set(self.dialogs_accepted.get() + 1);
        }
        Ok(open)
    }

    async fn close(self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn config(output_dir: &Path) -> Config {
    Config {
        login_url: LOGIN_URL.to_owned(),
        list_url: LIST_URL.to_owned(),
        wait_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(1),
        dialog_poll: Duration::from_millis(1),
        dialog_budget: Duration::from_millis(20),
        output_dir: output_dir.to_owned(),
        ..Config::default()
    }
}

pub const LISTING: &str = r#"<html><body><h3>ESF</h3>
<table class="overview">
  <tr><th>Form</th><th>Status</th><th></th></tr>
  <tr><th>A</th><td>open</td><td><input type="button" value="show" onclick="showForm(1);"></td></tr>
  <tr><th>B</th><td>closed</td><td><input type="button" value="show" onclick="showForm(2);"></td></tr>
</table></body></html>"#;

pub fn form_page(title: &str, section: &str, body: &str) -> String {
    format!(
        r#"<html><body><h3>{title}</h3>
<h3>{section}</h3><table class="overview">{body}</table>
<input type="submit" name="submit" value="Save"></body></html>"#
    )
}

pub fn item_page(title: &str, body: &str) -> String {
    format!(
        r#"<html><body><fieldset><h3>{title}</h3><table class="overview">{body}</table></fieldset>
<input type="submit" name="submit"></body></html>"#
    )
}
