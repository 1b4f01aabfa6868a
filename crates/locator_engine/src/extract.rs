use std::collections::HashSet;

use ego_tree::NodeRef;
use locator_core::{Branch, Candidate, PageAnchor, SiteLayout, Stage};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// How many ancestors to climb when looking for the row that contains an element.
const MAX_ROW_DEPTH: usize = 40;

/// Pulls branches and candidates out of raw listing pages.
///
/// References are read from both `href` and inline `onclick` handlers, since the
/// target pages open most of their entries through script calls.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    layout: SiteLayout,
    branch_pattern: Regex,
    opener_pattern: Regex,
}

impl PageExtractor {
    pub fn new(layout: SiteLayout) -> Result<Self, regex::Error> {
        let branch_pattern = Regex::new(&format!(
            r#"(?i){}\?[^"'\s)]+"#,
            regex::escape(layout.branch_file())
        ))?;
        let opener_pattern = Regex::new(&format!(
            r#"(?i)openwindow\(\s*['"]([^'"]*{}[^'"]*)['"]"#,
            regex::escape(layout.candidate_file())
        ))?;
        Ok(Self {
            layout,
            branch_pattern,
            opener_pattern,
        })
    }

    /// Branches linked from a search listing, deduplicated by reference in page order.
    pub fn extract_branches(&self, html: &str, page_ref: &str) -> Vec<Branch> {
        let document = Html::parse_document(html);
        let base = self.base_url(page_ref);
        let Ok(selector) = Selector::parse("[onclick], a[href]") else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut branches = Vec::new();
        for element in document.select(&selector) {
            let source = attribute_source(element);
            let Some(raw) = self.branch_pattern.find(&source) else {
                continue;
            };
            let Some(url) = resolve_reference(raw.as_str(), base.as_ref(), &self.layout) else {
                continue;
            };
            let navigable_ref = String::from(url.clone());
            if self.layout.classify(&navigable_ref) != Stage::BranchDetail {
                continue;
            }
            if !seen.insert(navigable_ref.clone()) {
                continue;
            }

            let id = query_param(&url, &self.layout.branch_id_param).unwrap_or_default();
            let label = match branch_name(element) {
                Some(name) if !id.is_empty() => {
                    format!("{name} ({}={id})", self.layout.branch_id_param)
                }
                Some(name) => name,
                None => self.layout.synthetic_branch_label(&id),
            };
            branches.push(Branch {
                navigable_ref,
                label,
                id,
            });
        }
        branches
    }

    /// Candidates listed on a leaf collection, deduplicated by reference in page order.
    pub fn extract_candidates(&self, html: &str, page_ref: &str) -> Vec<Candidate> {
        let document = Html::parse_document(html);
        self.candidates_in(&document, page_ref)
    }

    /// Finds the candidate with `id` on the page, keeping its anchor for highlighting.
    pub fn locate_candidate(&self, html: &str, page_ref: &str, id: &str) -> Option<Candidate> {
        let document = Html::parse_document(html);
        self.candidates_in(&document, page_ref)
            .into_iter()
            .find(|candidate| candidate.id == id)
    }

    fn candidates_in(&self, document: &Html, page_ref: &str) -> Vec<Candidate> {
        let base = self.base_url(page_ref);
        let Ok(selector) = Selector::parse("a[href], a[onclick]") else {
            return Vec::new();
        };
        let file = self.layout.candidate_file().to_ascii_lowercase();

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for element in document.select(&selector) {
            let href = element.value().attr("href").unwrap_or_default();
            let onclick = element.value().attr("onclick").unwrap_or_default();
            if !format!("{href} {onclick}").to_ascii_lowercase().contains(&file) {
                continue;
            }

            let raw = self
                .opener_target(href)
                .or_else(|| self.opener_target(onclick))
                .or_else(|| direct_link(href, &file));
            let Some(url) = raw.and_then(|raw| resolve_reference(&raw, base.as_ref(), &self.layout))
            else {
                continue;
            };
            let Some(id) = query_param(&url, &self.layout.candidate_id_param)
                .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
            else {
                continue;
            };
            let navigable_ref = String::from(url);
            if !seen.insert(navigable_ref.clone()) {
                continue;
            }

            candidates.push(Candidate {
                navigable_ref,
                id,
                anchor: anchor_of(element),
            });
        }
        candidates
    }

    fn opener_target(&self, source: &str) -> Option<String> {
        self.opener_pattern
            .captures(source)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn base_url(&self, page_ref: &str) -> Option<Url> {
        Url::parse(page_ref)
            .or_else(|_| Url::parse(&self.layout.origin))
            .ok()
    }
}

fn attribute_source(element: ElementRef) -> String {
    let onclick = element.value().attr("onclick").unwrap_or_default();
    let href = element.value().attr("href").unwrap_or_default();
    format!("{onclick} {href}")
}

fn direct_link(href: &str, file: &str) -> Option<String> {
    let trimmed = href.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("javascript:") || !lower.contains(file) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Human name for a branch entry: bold text of its row, else its own text.
fn branch_name(element: ElementRef) -> Option<String> {
    let bold = Selector::parse("b").ok()?;
    let from_row = closest_row(element)
        .and_then(|row| row.select(&bold).next())
        .map(element_text);
    let from_self = || {
        element
            .select(&bold)
            .next()
            .map(element_text)
            .or_else(|| Some(element_text(element)))
    };
    from_row
        .filter(|name| !name.is_empty())
        .or_else(from_self)
        .filter(|name| !name.is_empty())
}

fn closest_row(element: ElementRef) -> Option<ElementRef> {
    element
        .ancestors()
        .take(MAX_ROW_DEPTH)
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name().eq_ignore_ascii_case("tr"))
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
}

/// Resolves a raw reference lifted from markup against the page and the site layout.
///
/// Bare page names resolve into the directory the layout knows them under,
/// regardless of where the linking page lives.
pub fn resolve_reference(raw: &str, base: Option<&Url>, layout: &SiteLayout) -> Option<Url> {
    let mut reference = raw.trim().replace("&amp;", "&");
    while let Some(rest) = reference.strip_prefix("../") {
        reference = rest.to_string();
    }
    if let Some(rest) = reference.strip_prefix("./") {
        reference = rest.to_string();
    }
    if reference.is_empty() || reference.contains('[') {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(&reference).ok();
    }
    if lower.starts_with("javascript:") || lower.starts_with('#') {
        return None;
    }
    let base = base?;
    if reference.starts_with('/') {
        return base.join(&reference).ok();
    }

    let first_segment = reference.split(['/', '?']).next().unwrap_or_default();
    if reference.contains('/') && layout.is_known_directory(first_segment) {
        return base.join(&format!("/{reference}")).ok();
    }
    if let Some(dir) = layout.directory_of(first_segment) {
        return base.join(&format!("{dir}{reference}")).ok();
    }
    base.join(&reference).ok()
}

/// Position of `element` as child indices from the document root.
pub fn anchor_of(element: ElementRef) -> PageAnchor {
    let mut path = Vec::new();
    let mut node: NodeRef<Node> = *element;
    while node.parent().is_some() {
        path.push(node.prev_siblings().count());
        match node.parent() {
            Some(parent) => node = parent,
            None => break,
        }
    }
    path.reverse();
    PageAnchor(path)
}

/// Text of the row holding the anchored element, for reporting a located entry.
pub fn anchored_row_text(html: &str, anchor: &PageAnchor) -> Option<String> {
    let document = Html::parse_document(html);
    let mut node = document.tree.root();
    for &index in &anchor.0 {
        node = node.children().nth(index)?;
    }
    let element = ElementRef::wrap(node)?;
    let row = closest_row(element).unwrap_or(element);
    let text = element_text(row);
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://crm.example.com/nihul/AddProject2.php?ProjectID=1").unwrap()
    }

    #[test]
    fn bare_page_names_use_their_known_directory() {
        let layout = SiteLayout::default();
        let url = resolve_reference("EditUser.php?UserID=5", Some(&base()), &layout).unwrap();
        assert_eq!(
            url.as_str(),
            "https://crm.example.com/preferences/EditUser.php?UserID=5"
        );
        let url = resolve_reference("../../Wizard.php?CompanyID=2", Some(&base()), &layout).unwrap();
        assert_eq!(url.as_str(), "https://crm.example.com/nihul/Wizard.php?CompanyID=2");
    }

    #[test]
    fn known_directories_resolve_from_the_root() {
        let layout = SiteLayout::default();
        let url =
            resolve_reference("preferences/EditUser.php?UserID=5", Some(&base()), &layout).unwrap();
        assert_eq!(
            url.as_str(),
            "https://crm.example.com/preferences/EditUser.php?UserID=5"
        );
    }

    #[test]
    fn placeholders_and_scripts_are_rejected() {
        let layout = SiteLayout::default();
        assert!(resolve_reference("EditUser.php?UserID=[id]", Some(&base()), &layout).is_none());
        assert!(resolve_reference("javascript:void(0)", Some(&base()), &layout).is_none());
        assert!(resolve_reference("  ", Some(&base()), &layout).is_none());
    }

    #[test]
    fn anchors_point_back_at_their_row() {
        let html = r#"<html><body><table><tr><td>Dana</td><td><a id="x" href="/preferences/EditUser.php?UserID=9">edit</a></td></tr></table></body></html>"#;
        let document = Html::parse_document(html);
        let selector = Selector::parse("a#x").unwrap();
        let element = document.select(&selector).next().unwrap();
        let anchor = anchor_of(element);
        assert_eq!(anchored_row_text(html, &anchor).as_deref(), Some("Dana edit"));
    }
}
