use core::time::Duration;

use scraper::{Html, Selector};
use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::Error;

pub mod puppeteer;

pub use puppeteer::{Chrome, puppeteer};

pub const HISTORY_BACK: &str = "window.history.go(-1)";

/// What the scraper needs from a browser: go somewhere, run page script,
/// read back the rendered markup and get rid of native dialogs.
pub trait Driver {
    async fn navigate(&self, url: &str) -> anyhow::Result<()>;

    /// Runs `script` in the page and returns once it has run. Navigation it
    /// starts may still be in flight.
    async fn execute(&self, script: &str) -> anyhow::Result<()>;

    /// Queues `script` and returns before it runs, so a native dialog it
    /// opens cannot hold the caller.
    async fn dispatch(&self, script: &str) -> anyhow::Result<()>;

    /// Markup of the document as currently rendered, not as served.
    async fn page_source(&self) -> anyhow::Result<String>;

    /// Accepts an open alert/confirm. `Ok(false)` when none is showing.
    async fn accept_dialog(&self) -> anyhow::Result<bool>;

    async fn close(self) -> anyhow::Result<()>
    where
        Self: Sized;

    async fn has_element(&self, selector: &str) -> anyhow::Result<bool> {
        let selector = parse_selector(selector)?;
        let source = self.page_source().await?;
        Ok(Html::parse_document(&source).select(&selector).next().is_some())
    }
}

pub fn parse_selector(selector: &str) -> anyhow::Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow::anyhow!("invalid selector {selector:?}: {e:?}"))
}

/// Polls `check` every `interval` until it reports `true`. Gives up with
/// [`Error::Timeout`] once `timeout` has passed; check errors end the wait
/// immediately.
pub async fn wait_until<F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                what: what.to_owned(),
                after: timeout,
            }
            .into());
        }
        sleep(interval).await;
    }
}

pub async fn wait_for_element<D: Driver>(
    driver: &D,
    selector: &str,
    timeout: Duration,
    interval: Duration,
) -> anyhow::Result<()> {
    wait_until(selector, timeout, interval, move || driver.has_element(selector)).await
}

/// Like [`wait_for_element`], but a page still rendering `before` does not
/// count, so a selector that already matched on the previous page cannot
/// pass the wait early.
pub async fn wait_for_new_element<D: Driver>(
    driver: &D,
    selector: &str,
    before: &str,
    timeout: Duration,
    interval: Duration,
) -> anyhow::Result<()> {
    let parsed = parse_selector(selector)?;
    let parsed = &parsed;
    wait_until(selector, timeout, interval, move || async move {
        let source = driver.page_source().await?;
        let found =
            source != before && Html::parse_document(&source).select(parsed).next().is_some();
        Ok::<_, anyhow::Error>(found)
    })
    .await
}

/// Accepts the first native dialog showing up within `budget`. Returns
/// whether one was accepted; nothing showing up is not an error.
pub async fn dismiss_dialog<D: Driver>(
    driver: &D,
    budget: Duration,
    interval: Duration,
) -> anyhow::Result<bool> {
    let deadline = Instant::now() + budget;
    while Instant::now() < deadline {
        if driver.accept_dialog().await? {
            tracing::debug!(target: "dialog", "dialog accepted");
            return Ok(true);
        }
        sleep(interval).await;
    }
    Ok(false)
}

#[inline]
fn js_string(s: &str) -> String {
    Value::from(s).to_string()
}

pub fn set_value_script(field: &str, value: &str) -> String {
    format!(
        "document.getElementsByName({})[0].value = {}",
        js_string(field),
        js_string(value)
    )
}

pub fn click_script(name: &str) -> String {
    format!("document.getElementsByName({})[0].click()", js_string(name))
}

pub async fn fill_form_field<D: Driver>(driver: &D, field: &str, value: &str) -> anyhow::Result<()> {
    driver.execute(&set_value_script(field, value)).await
}

pub async fn fill_login_form<D: Driver>(
    driver: &D,
    (user_field, user): (&str, &str),
    (password_field, password): (&str, &str),
) -> anyhow::Result<()> {
    fill_form_field(driver, user_field, user).await?;
    fill_form_field(driver, password_field, password).await
}

pub async fn submit_form<D: Driver>(driver: &D, button: &str) -> anyhow::Result<()> {
    driver.execute(&click_script(button)).await
}
