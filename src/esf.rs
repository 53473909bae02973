//! ESF forms as they show up on the members area: the listing, the
//! sections of one form, and the tables hidden behind reveal callbacks.

use core::cell::Cell;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::{
    Error,
    config::Config,
    scrape::{Driver, HISTORY_BACK, wait_for_new_element, wait_until},
    util::{element_text, normalize},
};

pub type Row = Vec<String>;

macro_rules! selector {
    ($name:ident, $css:literal) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(SEL_TABLE, "table.overview");
selector!(SEL_TR, "tr");
selector!(SEL_TH, "th");
selector!(SEL_TD, "td");
selector!(SEL_H3, "h3");
selector!(SEL_A, "a");
selector!(SEL_INPUT, "input");
selector!(SEL_FIELDSET, "fieldset");
selector!(SEL_SECTION_ITEM, "h3, table.overview");

/// One row of the listing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub name: String,
    pub status: String,
    /// Script that opens the form page.
    pub callback: String,
    pub sections: Option<Vec<FormSection>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSection {
    pub name: String,
    /// Outer HTML of the section table, captured before the page changes.
    table: String,
    /// `None` until [`FormSection::parse`] ran.
    pub data: Option<Vec<Row>>,
    pub callbacks: Vec<String>,
}

/// Header cells then data cells of every row, text normalized. Reveal
/// callbacks found in data cells are pushed to `callbacks` when given.
fn extract_rows(table: ElementRef<'_>, mut callbacks: Option<&mut Vec<String>>) -> Vec<Row> {
    table
        .select(&SEL_TR)
        .map(|tr| {
            let mut row: Row = tr.select(&SEL_TH).map(element_text).collect();
            for td in tr.select(&SEL_TD) {
                if let Some(callbacks) = callbacks.as_deref_mut()
                    && let Some(onclick) = td.select(&SEL_A).next().and_then(|a| a.attr("onclick"))
                {
                    // drop the trailing `return false;`
                    let call = onclick.split(';').next().unwrap_or_default();
                    callbacks.push(call.to_owned());
                }
                row.push(element_text(td));
            }
            row
        })
        .collect()
}

/// Parses the listing page into forms, in table order. The first table row
/// is the header.
pub fn parse_listing(source: &str) -> anyhow::Result<Vec<Form>> {
    let html = Html::parse_document(source);
    let table = html
        .select(&SEL_TABLE)
        .next()
        .ok_or_else(|| Error::structure("listing has no overview table"))?;

    table
        .select(&SEL_TR)
        .enumerate()
        .skip(1)
        .map(|(idx, tr)| -> anyhow::Result<Form> {
            let name = tr
                .select(&SEL_TH)
                .next()
                .ok_or_else(|| Error::structure(format!("listing row {idx} has no label")))?;
            let mut cells = tr.select(&SEL_TD);
            let status = cells
                .next()
                .ok_or_else(|| Error::structure(format!("listing row {idx} has no status")))?;
            let callback = cells
                .next()
                .and_then(|td| td.select(&SEL_INPUT).next())
                .and_then(|input| input.attr("onclick"))
                .ok_or_else(|| Error::structure(format!("listing row {idx} has no show button")))?;

            Ok(Form {
                name: element_text(name),
                status: element_text(status),
                callback: normalize(callback),
                sections: None,
            })
        })
        .collect()
}

/// Splits a form page into sections. The first `h3` is the page title; every
/// table after it belongs to the closest heading above it, and each heading
/// must own exactly one table.
pub fn parse_sections(source: &str) -> anyhow::Result<Vec<FormSection>> {
    let html = Html::parse_document(source);
    let mut items = html.select(&SEL_SECTION_ITEM);

    match items.next() {
        Some(first) if first.value().name() == "h3" => {}
        Some(_) => anyhow::bail!(Error::structure("form page starts with a table, not a title")),
        None => anyhow::bail!(Error::structure("form page has no title")),
    }

    let mut heading: Option<String> = None;
    let mut sections = Vec::new();
    for item in items {
        if item.value().name() == "h3" {
            if let Some(orphan) = heading.replace(element_text(item)) {
                anyhow::bail!(Error::structure(format!("section {orphan:?} has no table")));
            }
        } else {
            let Some(name) = heading.take() else {
                anyhow::bail!(Error::structure(format!(
                    "table #{} has no heading",
                    sections.len() + 1
                )));
            };
            sections.push(FormSection::new(name, item.html()));
        }
    }
    if let Some(orphan) = heading {
        anyhow::bail!(Error::structure(format!("section {orphan:?} has no table")));
    }

    Ok(sections)
}

/// Reads the table a reveal callback brought up: the first fieldset of the
/// page, titled by its first heading. The title comes back as a one-cell
/// first row.
pub fn parse_nested(source: &str) -> anyhow::Result<Vec<Row>> {
    let html = Html::parse_document(source);
    let fieldset = html
        .select(&SEL_FIELDSET)
        .next()
        .ok_or_else(|| Error::structure("no fieldset on page"))?;
    let title = fieldset
        .select(&SEL_H3)
        .next()
        .ok_or_else(|| Error::structure("fieldset has no title"))?;
    let table = fieldset
        .select(&SEL_TABLE)
        .next()
        .ok_or_else(|| Error::structure("fieldset has no overview table"))?;

    let mut rows = vec![vec![element_text(title)]];
    rows.extend(extract_rows(table, None));
    Ok(rows)
}

fn first_fieldset(source: &str) -> Option<String> {
    Html::parse_document(source)
        .select(&SEL_FIELDSET)
        .next()
        .map(|fieldset| fieldset.html())
}

/// Outer HTML of the fieldset currently on the page, if any.
pub async fn current_fieldset<D: Driver>(driver: &D) -> anyhow::Result<Option<String>> {
    Ok(first_fieldset(&driver.page_source().await?))
}

/// Waits for a fieldset other than `stale` to render, then reads it.
pub async fn read_nested<D: Driver>(
    driver: &D,
    config: &Config,
    stale: Option<&str>,
) -> anyhow::Result<Vec<Row>> {
    let fresh = Cell::new(None);
    let slot = &fresh;
    wait_until("revealed fieldset", config.wait_timeout, config.poll_interval, move || async move {
        let source = driver.page_source().await?;
        let found = first_fieldset(&source)
            .is_some_and(|fieldset| Some(fieldset.as_str()) != stale);
        if found {
            slot.set(Some(source));
        }
        Ok::<_, anyhow::Error>(found)
    })
    .await?;
    parse_nested(&fresh.into_inner().unwrap_or_default())
}

pub async fn get_esf_list<D: Driver>(driver: &D, config: &Config) -> anyhow::Result<Vec<Form>> {
    driver.navigate(&config.list_url).await?;
    let source = driver.page_source().await?;
    let forms = parse_listing(&source)?;
    tracing::info!(target: "listing", "{} forms listed", forms.len());
    Ok(forms)
}

/// Opens the form page behind `callback` and waits for its submit control to
/// show up on a page other than the one the callback ran on.
pub async fn open_form<D: Driver>(driver: &D, config: &Config, callback: &str) -> anyhow::Result<()> {
    let before = driver.page_source().await?;
    driver.execute(callback).await?;
    wait_for_new_element(
        driver,
        &config.submit_selector(),
        &before,
        config.wait_timeout,
        config.poll_interval,
    )
    .await
}

/// Goes back from a form page and waits until the listing row holding
/// `callback` is rendered again.
pub async fn back_to_listing<D: Driver>(
    driver: &D,
    config: &Config,
    callback: &str,
) -> anyhow::Result<()> {
    driver.execute(HISTORY_BACK).await?;
    wait_until("listing", config.wait_timeout, config.poll_interval, move || async move {
        let source = driver.page_source().await?;
        let back = parse_listing(&source)
            .is_ok_and(|forms| forms.iter().any(|f| f.callback == callback));
        Ok::<_, anyhow::Error>(back)
    })
    .await
}

impl Form {
    /// Opens the form, reads all of its sections and goes back to the
    /// listing.
    pub async fn get_sections<D: Driver>(
        &mut self,
        driver: &D,
        config: &Config,
    ) -> anyhow::Result<&[FormSection]> {
        tracing::info!(target: "form", "{} ({})", self.name, self.status);

        open_form(driver, config, &self.callback).await?;
        let source = driver.page_source().await?;
        let mut sections = parse_sections(&source)?;
        for section in &mut sections {
            section.parse(driver, config).await?;
        }
        back_to_listing(driver, config, &self.callback).await?;

        Ok(self.sections.insert(sections).as_slice())
    }
}

impl FormSection {
    pub const fn new(name: String, table: String) -> Self {
        Self {
            name,
            table,
            data: None,
            callbacks: Vec::new(),
        }
    }

    /// Rows of the section table only, plus the reveal callbacks met on the
    /// way in left-to-right, top-to-bottom order.
    pub fn extract(&self) -> anyhow::Result<(Vec<Row>, Vec<String>)> {
        let fragment = Html::parse_fragment(&self.table);
        let table = fragment
            .select(&SEL_TABLE)
            .next()
            .ok_or_else(|| Error::structure(format!("section {:?} lost its table", self.name)))?;

        let mut callbacks = Vec::new();
        let rows = extract_rows(table, Some(&mut callbacks));
        Ok((rows, callbacks))
    }

    /// Fills `data`: the section rows, then for every reveal callback an
    /// empty row followed by the nested table it brings up. Callbacks run in
    /// place, so the fieldset read afterwards is the one they revealed.
    pub async fn parse<D: Driver>(&mut self, driver: &D, config: &Config) -> anyhow::Result<&[Row]> {
        tracing::info!(target: "section", "\t{}", self.name);

        let (mut data, callbacks) = self.extract()?;
        for callback in &callbacks {
            driver.execute(callback).await?;
            let nested = read_nested(driver, config, None).await?;
            data.push(Row::new());
            data.extend(nested);
        }
        self.callbacks = callbacks;

        Ok(self.data.insert(data).as_slice())
    }
}
