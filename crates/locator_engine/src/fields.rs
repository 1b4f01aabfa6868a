use locator_core::normalize_query;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Row labels that name the login field, compared against normalized label text.
const LOGIN_LABELS: &[&str] = &["login", "username", "user name", "שם משתמש"];

/// Reads the login value from a candidate page laid out as labelled rows.
///
/// A row counts when its label names the login field; failing that, a page
/// with exactly one username-shaped value yields that value.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    row_selector: &'static str,
    label_selector: &'static str,
    value_selector: &'static str,
    fallback_selector: &'static str,
    /// Bodies shorter than this are treated as carrying no data.
    min_body_len: usize,
    value_shape: Regex,
}

impl FieldExtractor {
    /// Narrow selectors for raw server HTML; short bodies are empty shells.
    pub fn strict() -> Self {
        Self {
            row_selector: ".wrappRow",
            label_selector: ".txt_template, .wrappTxtCell",
            value_selector: ".wrappValCell span",
            fallback_selector: ".wrappValCell span",
            min_body_len: 200,
            value_shape: username_shape(),
        }
    }

    /// Broader selectors for pages whose markup varies once fully loaded.
    pub fn lenient() -> Self {
        Self {
            row_selector: ".wrappRow",
            label_selector: ".txt_template, .wrappTxtCell, .label, .title, b",
            value_selector: ".wrappValCell span, .wrappValCell, .value, .val",
            fallback_selector: ".wrappValCell span",
            min_body_len: 0,
            value_shape: username_shape(),
        }
    }

    pub fn extract(&self, html: &str) -> Option<String> {
        if html.len() < self.min_body_len {
            return None;
        }
        let document = Html::parse_document(html);
        let row_sel = Selector::parse(self.row_selector).ok()?;
        let label_sel = Selector::parse(self.label_selector).ok()?;
        let value_sel = Selector::parse(self.value_selector).ok()?;

        for row in document.select(&row_sel) {
            let Some(label) = row.select(&label_sel).next().map(normalized_text) else {
                continue;
            };
            if !is_login_label(&label) {
                continue;
            }
            if let Some(value) = row
                .select(&value_sel)
                .next()
                .map(normalized_text)
                .filter(|value| !value.is_empty())
            {
                return Some(value);
            }
        }

        self.single_shaped_value(&document)
    }

    fn single_shaped_value(&self, document: &Html) -> Option<String> {
        let fallback_sel = Selector::parse(self.fallback_selector).ok()?;
        let mut shaped = document
            .select(&fallback_sel)
            .map(normalized_text)
            .filter(|value| self.value_shape.is_match(value));
        let first = shaped.next()?;
        match shaped.next() {
            Some(_) => None,
            None => Some(first),
        }
    }
}

fn username_shape() -> Regex {
    Regex::new(r"^[a-z0-9._-]{2,40}$").expect("username pattern")
}

fn normalized_text(element: ElementRef) -> String {
    normalize_query(&element.text().collect::<String>())
}

fn is_login_label(label: &str) -> bool {
    if label.is_empty() {
        return false;
    }
    LOGIN_LABELS.iter().any(|known| label.contains(known))
        || (label.contains("משתמש") && label.contains("שם"))
}
