use std::sync::Arc;

use locator_core::{Candidate, PageAnchor};
use locator_engine::{
    CandidateProber, FailureKind, FetchSettings, HttpProber, MatchPolicy, ProbeSettings,
    ProbeVerdict, RequestProfile, ReqwestFetcher, TwoTierProber,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn profile_page(login: &str) -> String {
    format!(
        r#"<html><head><title>Edit user</title></head><body><!-- {} -->
<div class="wrappRow"><span class="txt_template">Username</span><div class="wrappValCell"><span>{login}</span></div></div>
</body></html>"#,
        "padding ".repeat(30)
    )
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/html; charset=utf-8")
}

#[tokio::test]
async fn background_profile_sends_marker_header_and_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/preferences/EditUser.php"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("Cookie", "PHPSESSID=abc"))
        .respond_with(html("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        cookie: Some("PHPSESSID=abc".to_string()),
        ..FetchSettings::default()
    })
    .unwrap();
    let url = format!("{}/preferences/EditUser.php?UserID=1", server.uri());
    let output = fetcher.fetch(&url, RequestProfile::Background).await.unwrap();
    assert_eq!(output.bytes, b"<html>ok</html>");
    assert_eq!(output.metadata.original_url, url);
}

#[tokio::test]
async fn error_status_and_foreign_content_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(path("/image"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let err = fetcher
        .fetch(&format!("{}/missing", server.uri()), RequestProfile::Page)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));

    let err = fetcher
        .fetch(&format!("{}/image", server.uri()), RequestProfile::Page)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::UnsupportedContentType { .. }));

    let err = fetcher
        .fetch("not a url", RequestProfile::Page)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn legacy_charset_pages_are_decoded() {
    let server = MockServer::start().await;
    let (bytes, _, _) = encoding_rs::WINDOWS_1255.encode("<p>שם משתמש</p>");
    Mock::given(path("/legacy"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(bytes.into_owned(), "text/html; charset=windows-1255"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let text = fetcher
        .fetch_text(&format!("{}/legacy", server.uri()), RequestProfile::Page)
        .await
        .unwrap();
    assert!(text.contains("שם משתמש"));
}

#[tokio::test]
async fn http_prober_reads_login_on_the_fast_path() {
    let server = MockServer::start().await;
    Mock::given(path("/preferences/EditUser.php"))
        .and(query_param("UserID", "7"))
        .respond_with(html(profile_page("Alice")))
        .mount(&server)
        .await;

    let prober = HttpProber::new(FetchSettings::default()).unwrap();
    let url = format!("{}/preferences/EditUser.php?UserID=7", server.uri());
    assert_eq!(prober.probe_fast(&url).await.unwrap().as_deref(), Some("alice"));
}

#[tokio::test]
async fn thin_background_answer_falls_back_to_full_page_polling() {
    let server = MockServer::start().await;
    // The background request gets an empty shell; only a full page load carries the data.
    Mock::given(path("/preferences/EditUser.php"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(html("<html><body></body></html>"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(path("/preferences/EditUser.php"))
        .respond_with(html(profile_page("alice")))
        .with_priority(2)
        .mount(&server)
        .await;

    let backend = Arc::new(HttpProber::new(FetchSettings::default()).unwrap());
    let prober = TwoTierProber::new(backend, ProbeSettings::default(), MatchPolicy::Exact);
    let candidate = Candidate {
        navigable_ref: format!("{}/preferences/EditUser.php?UserID=8", server.uri()),
        id: "8".to_string(),
        anchor: PageAnchor::default(),
    };

    let verdict = prober
        .probe(&candidate, "Alice", &CancellationToken::new())
        .await;
    assert_eq!(verdict, ProbeVerdict::Match);
}

#[tokio::test]
async fn loaded_page_without_a_value_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(path("/preferences/EditUser.php"))
        .and(query_param("UserID", "10"))
        .respond_with(html("<html><body><p>Profile unavailable</p></body></html>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/preferences/EditUser.php"))
        .and(query_param("UserID", "11"))
        .respond_with(html(""))
        .expect(3)
        .mount(&server)
        .await;

    let prober = HttpProber::new(FetchSettings::default()).unwrap();
    let settled = format!("{}/preferences/EditUser.php?UserID=10", server.uri());
    let empty = format!("{}/preferences/EditUser.php?UserID=11", server.uri());
    for _ in 0..3 {
        assert_eq!(prober.probe_thorough(&settled).await.unwrap(), None);
        assert_eq!(prober.probe_thorough(&empty).await.unwrap(), None);
    }
}

#[tokio::test]
async fn unreachable_candidate_is_inconclusive() {
    let server = MockServer::start().await;
    Mock::given(path("/preferences/EditUser.php"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = Arc::new(HttpProber::new(FetchSettings::default()).unwrap());
    let prober = TwoTierProber::new(backend, ProbeSettings::default(), MatchPolicy::Exact);
    let candidate = Candidate {
        navigable_ref: format!("{}/preferences/EditUser.php?UserID=9", server.uri()),
        id: "9".to_string(),
        anchor: PageAnchor::default(),
    };
    let verdict = prober
        .probe(&candidate, "alice", &CancellationToken::new())
        .await;
    assert_eq!(verdict, ProbeVerdict::Inconclusive);
}
