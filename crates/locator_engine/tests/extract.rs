use locator_core::SiteLayout;
use locator_engine::{anchored_row_text, FieldExtractor, PageExtractor};
use pretty_assertions::assert_eq;

const SEARCH_REF: &str = "https://crm.example.com/nihul/Wizard.php?q=alice";
const LEAF_REF: &str = "https://crm.example.com/nihul/AddProject2.php?ProjectID=11&CompanyID=3";

fn extractor() -> PageExtractor {
    PageExtractor::new(SiteLayout::with_origin("https://crm.example.com")).unwrap()
}

const LISTING: &str = r#"
<html><body>
<table>
  <tr onclick="location.href='Wizard.php?CompanyID=3&amp;FindedProjects=11,12'">
    <td><b>Acme Ltd</b></td><td>2 projects</td>
  </tr>
  <tr>
    <td><a href="/nihul/Wizard.php?CompanyID=5&FindedProjects=20">open</a></td>
  </tr>
  <tr onclick="location.href='Wizard.php?CompanyID=3&amp;FindedProjects=11,12'">
    <td><b>Acme Ltd (duplicate row)</b></td>
  </tr>
  <tr><td><a href="/nihul/Other.php?CompanyID=9">elsewhere</a></td></tr>
</table>
</body></html>
"#;

#[test]
fn branches_come_from_rows_and_links_in_page_order() {
    let branches = extractor().extract_branches(LISTING, SEARCH_REF);
    let summary: Vec<_> = branches
        .iter()
        .map(|b| (b.id.as_str(), b.label.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![("3", "Acme Ltd (CompanyID=3)"), ("5", "open (CompanyID=5)")]
    );
    assert_eq!(
        branches[0].navigable_ref,
        "https://crm.example.com/nihul/Wizard.php?CompanyID=3&FindedProjects=11,12"
    );
}

#[test]
fn same_named_branches_stay_distinguishable() {
    let html = r#"<table>
      <tr><td><b>Cohen</b></td><td><a href="Wizard.php?CompanyID=4&FindedProjects=1">open</a></td></tr>
      <tr><td><b>Cohen</b></td><td><a href="Wizard.php?CompanyID=6&FindedProjects=2">open</a></td></tr>
    </table>"#;
    let labels: Vec<_> = extractor()
        .extract_branches(html, SEARCH_REF)
        .into_iter()
        .map(|b| b.label)
        .collect();
    assert_eq!(labels, vec!["Cohen (CompanyID=4)", "Cohen (CompanyID=6)"]);
}

#[test]
fn listing_without_branch_links_yields_nothing() {
    let html = "<html><body><p>No results for alice</p></body></html>";
    assert!(extractor().extract_branches(html, SEARCH_REF).is_empty());
}

const LEAF: &str = r#"
<html><body>
<table id="users">
  <tr><td>Dana</td><td><a href="javascript:void(0)" onclick="openWindow('EditUser.php?UserID=7', 600)">edit</a></td></tr>
  <tr><td>Eli</td><td><a href="javascript:openWindow('../preferences/EditUser.php?UserID=8')">edit</a></td></tr>
  <tr><td>Noa</td><td><a href="/preferences/EditUser.php?UserID=9">edit</a></td></tr>
  <tr><td>Copy</td><td><a href="/preferences/EditUser.php?UserID=9">again</a></td></tr>
  <tr><td>Template</td><td><a href="/preferences/EditUser.php?UserID=[id]">x</a></td></tr>
  <tr><td>Named</td><td><a href="/preferences/EditUser.php?UserID=abc">x</a></td></tr>
</table>
</body></html>
"#;

#[test]
fn candidates_resolve_script_openers_and_plain_links() {
    let candidates = extractor().extract_candidates(LEAF, LEAF_REF);
    let ids: Vec<_> = candidates.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["7", "8", "9"]);
    for candidate in &candidates {
        assert!(
            candidate
                .navigable_ref
                .starts_with("https://crm.example.com/preferences/EditUser.php?UserID="),
            "unexpected reference {}",
            candidate.navigable_ref
        );
    }
}

#[test]
fn located_candidate_anchor_points_at_its_row() {
    let extractor = extractor();
    let candidate = extractor
        .locate_candidate(LEAF, LEAF_REF, "8")
        .expect("candidate 8 listed");
    assert_eq!(
        anchored_row_text(LEAF, &candidate.anchor).as_deref(),
        Some("Eli edit")
    );
    assert!(extractor.locate_candidate(LEAF, LEAF_REF, "404").is_none());
}

fn profile(rows: &str) -> String {
    // Padding keeps the body above the strict extractor's minimum size.
    format!(
        "<html><body><!-- {} --><div class=\"profile\">{rows}</div></body></html>",
        "x".repeat(200)
    )
}

#[test]
fn strict_extractor_reads_labelled_login_row() {
    let html = profile(
        r#"<div class="wrappRow"><span class="txt_template">Full name</span><div class="wrappValCell"><span>Alice Smith</span></div></div>
           <div class="wrappRow"><span class="txt_template">Username</span><div class="wrappValCell"><span>Alice.S</span></div></div>"#,
    );
    assert_eq!(FieldExtractor::strict().extract(&html).as_deref(), Some("alice.s"));
}

#[test]
fn strict_extractor_ignores_short_shells() {
    let html = r#"<div class="wrappRow"><span class="txt_template">Username</span><div class="wrappValCell"><span>alice</span></div></div>"#;
    assert_eq!(FieldExtractor::strict().extract(html), None);
    assert_eq!(FieldExtractor::lenient().extract(html).as_deref(), Some("alice"));
}

#[test]
fn single_username_shaped_value_is_a_fallback() {
    let html = profile(
        r#"<div class="wrappRow"><div class="wrappValCell"><span>Alice Smith</span></div></div>
           <div class="wrappRow"><div class="wrappValCell"><span>asmith</span></div></div>"#,
    );
    assert_eq!(FieldExtractor::strict().extract(&html).as_deref(), Some("asmith"));

    let ambiguous = profile(
        r#"<div class="wrappValCell"><span>asmith</span></div><div class="wrappValCell"><span>bcohen</span></div>"#,
    );
    assert_eq!(FieldExtractor::strict().extract(&ambiguous), None);
}
