use std::{ffi::OsStr, path::PathBuf, sync::Arc, time::Duration};

use headless_chrome::{Browser, LaunchOptions, Tab, protocol::cdp::Page, types::RemoteError};
use tokio::task::spawn_blocking;

use super::Driver;

const NO_DIALOG: &str = "No dialog is showing";

/// Whether `err` is DevTools reporting that there is no dialog to handle.
fn is_no_dialog(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RemoteError>()
        .is_some_and(|e| e.message.contains(NO_DIALOG))
}

pub fn puppeteer(headless: bool, path: Option<PathBuf>) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![OsStr::new("--disable-blink-features=AutomationControlled")],
        headless,
        path,
        idle_browser_timeout: Duration::from_secs(600),
        ..LaunchOptions::default()
    })
}

#[allow(clippy::significant_drop_tightening)]
pub fn first_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let tab = browser.new_tab()?;

    {
        let tabs_guard = browser
            .get_tabs()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for remain in &*tabs_guard {
            if !Arc::ptr_eq(&tab, remain) {
                remain.close(true)?;
            }
        }
    }

    Ok(tab)
}

/// One Chrome process driven through a single tab.
pub struct Chrome {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl Chrome {
    pub fn launch(headless: bool, path: Option<PathBuf>) -> anyhow::Result<Self> {
        let browser = puppeteer(headless, path)?;
        let tab = first_tab(&browser)?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    async fn with_tab<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        spawn_blocking(move || f(&tab)).await?
    }
}

impl Driver for Chrome {
    async fn navigate(&self, url: &str) -> anyhow::Result<()> {
        let url = url.to_owned();
        self.with_tab(move |tab| tab.navigate_to(&url)?.wait_until_navigated().map(|_| ()))
            .await
    }

    async fn execute(&self, script: &str) -> anyhow::Result<()> {
        let script = script.to_owned();
        self.with_tab(move |tab| tab.evaluate(&script, false).map(|_| ()))
            .await
    }

    async fn dispatch(&self, script: &str) -> anyhow::Result<()> {
        let script = format!("setTimeout(function () {{ {script} }}, 0)");
        self.with_tab(move |tab| tab.evaluate(&script, false).map(|_| ()))
            .await
    }

    async fn page_source(&self) -> anyhow::Result<String> {
        self.with_tab(Tab::get_content).await
    }

    async fn accept_dialog(&self) -> anyhow::Result<bool> {
        self.with_tab(|tab| {
            match tab.call_method(Page::HandleJavaScriptDialog {
                accept: true,
                prompt_text: None,
            }) {
                Ok(_) => Ok(true),
                Err(err) if is_no_dialog(&err) => Ok(false),
                Err(err) => Err(err),
            }
        })
        .await
    }

    async fn close(self) -> anyhow::Result<()> {
        self.with_tab(|tab| tab.close(true).map(|_| ())).await
    }
}
