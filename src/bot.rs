use std::path::PathBuf;

use crate::{
    Error,
    config::Config,
    esf::{current_fieldset, get_esf_list, open_form, read_nested},
    login::{Credentials, login},
    output::{Dump, write_file},
    scrape::{Driver, dismiss_dialog},
};

/// Owns the browser session for the whole run.
pub struct Bot<D> {
    driver: D,
    config: Config,
}

impl<D: Driver> Bot<D> {
    pub const fn new(driver: D, config: Config) -> Self {
        Self { driver, config }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn driver(&self) -> &D {
        &self.driver
    }

    pub async fn login(&self, credentials: &Credentials) -> anyhow::Result<()> {
        login(&self.driver, &self.config, credentials).await
    }

    /// One file per listed form, named after the form. Any failure aborts the
    /// whole run.
    pub async fn get_esf_to_csv(&self) -> anyhow::Result<Vec<PathBuf>> {
        let forms = get_esf_list(&self.driver, &self.config).await?;

        let mut written = Vec::with_capacity(forms.len());
        for mut form in forms {
            let sections = form.get_sections(&self.driver, &self.config).await?;

            let mut dump = Dump::default();
            dump.sections(sections)?;
            written.push(write_file(&self.config.output_dir, &form.name, dump.as_str())?);
        }
        Ok(written)
    }

    /// One file per item id. Items are revealed from the page of the first
    /// listed form; an item that fails is logged and skipped.
    pub async fn get_all_esf_to_csv<I>(&self, ids: I) -> anyhow::Result<Vec<PathBuf>>
    where
        I: IntoIterator<Item = u32>,
    {
        let forms = get_esf_list(&self.driver, &self.config).await?;
        let base = forms
            .first()
            .ok_or_else(|| Error::structure("listing has no forms"))?;
        open_form(&self.driver, &self.config, &base.callback).await?;

        let mut written = Vec::new();
        for id in ids {
            tracing::info!(target: "bulk", "Getting item {id}");
            match self.get_item(id).await {
                Ok(path) => written.push(path),
                Err(e) => tracing::warn!(target: "bulk", "\x1b[31mFailed getting item {id}\x1b[0m: {e:#}"),
            }
        }
        Ok(written)
    }

    async fn get_item(&self, id: u32) -> anyhow::Result<PathBuf> {
        let stale = current_fieldset(&self.driver).await?;
        self.driver.dispatch(&self.config.item_callback(id)).await?;
        dismiss_dialog(&self.driver, self.config.dialog_budget, self.config.dialog_poll).await?;

        tracing::info!(target: "bulk", "Parsing item {id}");
        let rows = read_nested(&self.driver, &self.config, stale.as_deref()).await?;

        let name = id.to_string();
        let mut dump = Dump::default();
        dump.block(&name, &rows)?;
        write_file(&self.config.output_dir, &name, dump.as_str())
    }

    pub async fn exit(self) -> anyhow::Result<()> {
        self.driver.close().await
    }
}
