//! Tests for conditional downloads and login-page detection against a local
//! HTTP server.

use std::time::Duration;

use retrieval::client::http_date;
use retrieval::{ArchiveClient, ClientConfig, RetrievalError, RetryPolicy};
use test_utils::{StubResponse, StubServer};

const GRANULE: &str = "/ob/getfile/A2019187143000.L2_LAC_OC.nc";

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Earthdata Login</title></head>
<body><form action="/login" method="post"></form></body></html>"#;

fn client(retry: RetryPolicy) -> ArchiveClient {
    ArchiveClient::new(ClientConfig {
        retry,
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
        credentials: None,
    })
    .unwrap()
}

/// Retries allowed, so a single request proves the error was final.
fn patient() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1))
}

// ============================================================================
// Conditional downloads
// ============================================================================

#[tokio::test]
async fn test_first_download_is_unconditional() {
    let server = StubServer::start([(GRANULE, StubResponse::ok("granule bytes"))]).await;
    let work = tempfile::tempdir().unwrap();
    let dest = work.path().join("granule.nc");

    let download = client(RetryPolicy::none())
        .download(&server.url(GRANULE), &[], &dest)
        .await
        .unwrap();

    assert!(!download.not_modified);
    assert_eq!(download.bytes, 13);
    assert_eq!(download.file_name, "A2019187143000.L2_LAC_OC.nc");
    assert_eq!(std::fs::read(&dest).unwrap(), b"granule bytes");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("if-modified-since"), None);
}

#[tokio::test]
async fn test_existing_copy_sends_if_modified_since_and_keeps_file_on_304() {
    let server = StubServer::start([(GRANULE, StubResponse::status(304))]).await;
    let work = tempfile::tempdir().unwrap();
    let dest = work.path().join("granule.nc");
    std::fs::write(&dest, b"cached copy").unwrap();
    let modified = std::fs::metadata(&dest).unwrap().modified().unwrap();

    let download = client(RetryPolicy::none())
        .download(&server.url(GRANULE), &[], &dest)
        .await
        .unwrap();

    assert!(download.not_modified);
    assert_eq!(download.bytes, 0);
    assert_eq!(download.path, dest);
    assert_eq!(std::fs::read(&dest).unwrap(), b"cached copy");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let expected = http_date(modified);
    assert_eq!(
        requests[0].header("if-modified-since"),
        Some(expected.as_str())
    );
}

#[tokio::test]
async fn test_newer_copy_replaces_existing_file() {
    let server = StubServer::start([(GRANULE, StubResponse::ok("fresh"))]).await;
    let work = tempfile::tempdir().unwrap();
    let dest = work.path().join("granule.nc");
    std::fs::write(&dest, b"stale").unwrap();

    let download = client(RetryPolicy::none())
        .download(&server.url(GRANULE), &[], &dest)
        .await
        .unwrap();

    assert!(!download.not_modified);
    assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    assert!(server.requests()[0].header("if-modified-since").is_some());
    // No partial files are left next to the destination
    assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_content_disposition_names_the_download() {
    let response = StubResponse::ok("subset")
        .header("Content-Disposition", "attachment; filename=\"sst.20190706.nc\"");
    let server = StubServer::start([("/thredds/ncss/sst", response)]).await;
    let work = tempfile::tempdir().unwrap();

    let download = client(RetryPolicy::none())
        .download(
            &server.url("/thredds/ncss/sst"),
            &[("var".to_string(), "sst".to_string())],
            &work.path().join("sst"),
        )
        .await
        .unwrap();

    assert_eq!(download.file_name, "sst.20190706.nc");
    assert_eq!(server.requests()[0].query.as_deref(), Some("var=sst"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_login_page_is_unauthorized_and_not_retried() {
    let server = StubServer::start([(GRANULE, StubResponse::html(LOGIN_PAGE))]).await;
    let work = tempfile::tempdir().unwrap();
    let dest = work.path().join("granule.nc");

    let err = client(patient())
        .download(&server.url(GRANULE), &[], &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Unauthorized(ref url) if url.ends_with(GRANULE)));
    assert!(!err.is_transient());
    assert!(!err.is_fatal());
    assert_eq!(server.requests().len(), 1);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_html_without_login_marker_is_kept() {
    let page = "<html><body>granule listing</body></html>";
    let server = StubServer::start([(GRANULE, StubResponse::html(page))]).await;
    let work = tempfile::tempdir().unwrap();
    let dest = work.path().join("granule.nc");

    let download = client(RetryPolicy::none())
        .download(&server.url(GRANULE), &[], &dest)
        .await
        .unwrap();

    assert_eq!(download.bytes, page.len() as u64);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), page);
}

#[tokio::test]
async fn test_missing_granule_is_a_final_status_error() {
    let server = StubServer::start(Vec::<(&str, StubResponse)>::new()).await;
    let work = tempfile::tempdir().unwrap();

    let err = client(patient())
        .download(&server.url(GRANULE), &[], &work.path().join("granule.nc"))
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Http { status: 404, .. }));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_listing_text_is_fetched() {
    let listing = "<html><a href=\"x\">x</a></html>";
    let server = StubServer::start([("/SeaWiFS/L2/1999/190/", StubResponse::html(listing))]).await;

    let text = client(RetryPolicy::none())
        .get_text(&server.url("/SeaWiFS/L2/1999/190/"))
        .await
        .unwrap();

    assert_eq!(text, listing);
}
