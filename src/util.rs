use std::borrow::Cow;

use scraper::ElementRef;

/// Flattens scraped text onto one line: drops `\n`, `\r` and `\t`, trims both
/// ends and squeezes runs of spaces down to a single space.
pub fn normalize(raw: &str) -> String {
    let stripped = raw.replace(['\n', '\r', '\t'], "");

    let mut out = String::with_capacity(stripped.len());
    for word in stripped.trim().split(' ').filter(|w| !w.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

#[inline]
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize(&element.text().collect::<String>())
}

/// Form names end up as file names; keep them inside the output directory.
pub fn file_stem(name: &str) -> Cow<'_, str> {
    if name.contains(['/', '\\']) {
        Cow::Owned(name.replace(['/', '\\'], "_"))
    } else {
        Cow::Borrowed(name)
    }
}
