//! End-to-end pipeline runs against mocked Confluence and bucket seams.
//!
//! Scenario under test: homepage H has children [A, B], B has child [C].
//! A is empty, B succeeds on its second download attempt, C never downloads.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use confluence_space_export::config::Config;
use confluence_space_export::contract::{
    Credentials, MockBucketStore, MockConfluenceApi, PageId, PageOutcome, SpaceId,
};
use confluence_space_export::export::ExportDestination;
use confluence_space_export::pipeline::{export_space, CancelFlag, ExportResponse};

const HOMEPAGE: &str = "100";
const PAGE_A: &str = "201";
const PAGE_B: &str = "202";
const PAGE_C: &str = "203";

fn page(id: &str) -> PageId {
    PageId::from(id)
}

fn test_config() -> Config {
    Config {
        credentials: Credentials {
            domain: "example.atlassian.net".to_owned(),
            email: "exporter@example.com".to_owned(),
            api_token: "token".to_owned(),
        },
        space_key: "OR".to_owned(),
        bucket_name: Some("snapshots".to_owned()),
        output_dir: PathBuf::from("confluence_downloads"),
        wait_seconds: 1,
    }
}

/// Mock the resolution and traversal stages for the H → [A, B], B → [C] tree.
fn expect_space_resolution(api: &mut MockConfluenceApi) {
    api.expect_resolve_space_id()
        .withf(|key| key == "OR")
        .returning(|_| Ok(SpaceId("9001".to_owned())));
    api.expect_resolve_homepage_id()
        .withf(|id| id.0 == "9001")
        .returning(|_| Ok(page(HOMEPAGE)));
    api.expect_list_children()
        .withf(|id| id.as_str() == HOMEPAGE)
        .returning(|_| {
            Ok(vec![
                (page(PAGE_A), "Alpha".to_owned()),
                (page(PAGE_B), "Page B".to_owned()),
            ])
        });
    api.expect_list_children()
        .withf(|id| id.as_str() == PAGE_B)
        .returning(|_| Ok(vec![(page(PAGE_C), "Gamma".to_owned())]));
    api.expect_list_children()
        .withf(|id| id.as_str() == PAGE_A || id.as_str() == PAGE_C)
        .returning(|_| Ok(vec![]));
}

#[tokio::test(start_paused = true)]
async fn mixed_outcomes_are_bucketed_and_clear_happens_before_any_upload() {
    let mut api = MockConfluenceApi::new();
    expect_space_resolution(&mut api);

    // A is empty; B and C have content.
    api.expect_is_empty()
        .withf(|id| id.as_str() == PAGE_A)
        .times(1)
        .returning(|_| Ok(true));
    api.expect_is_empty()
        .withf(|id| id.as_str() != PAGE_A)
        .returning(|_| Ok(false));

    // Export initiation always yields a URL naming the page.
    api.expect_initiate_pdf_export()
        .returning(|id| Ok(Some(format!("https://signed.example/{id}"))));

    // B settles on the second fetch; C never settles. 2 + 3 = 5 fetches.
    let fetch_count = Arc::new(AtomicUsize::new(0));
    let b_fetches = Arc::new(AtomicUsize::new(0));
    {
        let fetch_count = Arc::clone(&fetch_count);
        let b_fetches = Arc::clone(&b_fetches);
        api.expect_fetch_export_pdf().returning(move |url| {
            fetch_count.fetch_add(1, Ordering::SeqCst);
            if url.ends_with(PAGE_B) {
                if b_fetches.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(None)
                } else {
                    Ok(Some(Bytes::from_static(b"%PDF-1.4 B")))
                }
            } else {
                Ok(None)
            }
        });
    }

    let cleared = Arc::new(AtomicBool::new(false));
    let mut store = MockBucketStore::new();
    {
        let cleared = Arc::clone(&cleared);
        store.expect_clear().times(1).returning(move || {
            cleared.store(true, Ordering::SeqCst);
            Ok(())
        });
    }
    {
        let cleared = Arc::clone(&cleared);
        store
            .expect_upload()
            .times(1)
            .withf(|key, _, content_type| {
                key == "Page_B_confluencePageId=202.pdf" && content_type == "application/pdf"
            })
            .returning(move |_, _, _| {
                assert!(
                    cleared.load(Ordering::SeqCst),
                    "bucket must be cleared before any upload"
                );
                Ok(())
            });
    }

    let destination = ExportDestination::Bucket(Arc::new(store));
    let report = export_space(&api, &destination, &test_config(), &CancelFlag::new())
        .await
        .expect("pipeline run succeeds");

    assert_eq!(report.pages_with(PageOutcome::EmptyPage), &[page(PAGE_A)]);
    assert_eq!(
        report.pages_with(PageOutcome::DownloadSuccessful),
        &[page(PAGE_B)]
    );
    assert_eq!(report.pages_with(PageOutcome::DownloadFailed), &[page(PAGE_C)]);
    assert_eq!(report.total_pages(), 3);
    assert_eq!(
        fetch_count.load(Ordering::SeqCst),
        5,
        "1 empty page (no fetch) + 2 fetches for B + 3 for C"
    );
}

#[tokio::test]
async fn failed_bucket_clear_aborts_the_run_before_any_remote_call() {
    let api = MockConfluenceApi::new();
    // No api expectations: any Confluence call would panic the mock.

    let mut store = MockBucketStore::new();
    store.expect_clear().times(1).returning(|| {
        Err(confluence_space_export::error::StoreError::Config(
            "denied".to_owned(),
        ))
    });

    let destination = ExportDestination::Bucket(Arc::new(store));
    let result = export_space(&api, &destination, &test_config(), &CancelFlag::new()).await;

    let err = result.expect_err("clear failure is fatal");
    let response = ExportResponse::failure("Could not clean bucket", err);
    assert_eq!(response.status, -1);
}

#[tokio::test]
async fn missing_homepage_is_fatal() {
    let mut api = MockConfluenceApi::new();
    api.expect_resolve_space_id()
        .returning(|_| Ok(SpaceId("9001".to_owned())));
    api.expect_resolve_homepage_id()
        .returning(|_| Err(confluence_space_export::error::ApiError::HomepageNotFound));

    let mut store = MockBucketStore::new();
    store.expect_clear().returning(|| Ok(()));

    let destination = ExportDestination::Bucket(Arc::new(store));
    let result = export_space(&api, &destination, &test_config(), &CancelFlag::new()).await;
    assert!(result.is_err(), "a space without a homepage cannot be exported");
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_issuing_new_page_exports() {
    let mut api = MockConfluenceApi::new();
    expect_space_resolution(&mut api);

    let cancel = CancelFlag::new();

    // The first page (A) is processed; its emptiness check cancels the run,
    // so B and C must never be exported.
    {
        let cancel = cancel.clone();
        api.expect_is_empty()
            .withf(|id| id.as_str() == PAGE_A)
            .times(1)
            .returning(move |_| {
                cancel.cancel();
                Ok(true)
            });
    }
    // No expectations for B or C: exporting them would panic the mock.

    let mut store = MockBucketStore::new();
    store.expect_clear().times(1).returning(|| Ok(()));

    let destination = ExportDestination::Bucket(Arc::new(store));
    let report = export_space(&api, &destination, &test_config(), &cancel)
        .await
        .expect("cancelled run still returns its partial report");

    assert_eq!(report.total_pages(), 1);
    assert_eq!(report.pages_with(PageOutcome::EmptyPage), &[page(PAGE_A)]);
}

#[tokio::test(start_paused = true)]
async fn filesystem_fallback_writes_pdfs_under_the_output_dir() {
    let dir = tempfile::tempdir().unwrap();

    let mut api = MockConfluenceApi::new();
    expect_space_resolution(&mut api);
    api.expect_is_empty().returning(|id| Ok(id.as_str() == PAGE_A));
    api.expect_initiate_pdf_export()
        .returning(|id| Ok(Some(format!("https://signed.example/{id}"))));
    api.expect_fetch_export_pdf()
        .returning(|_| Ok(Some(Bytes::from_static(b"%PDF-1.4"))));

    let destination = ExportDestination::LocalDir(dir.path().to_path_buf());
    let mut config = test_config();
    config.bucket_name = None;
    config.output_dir = dir.path().to_path_buf();

    let report = export_space(&api, &destination, &config, &CancelFlag::new())
        .await
        .expect("pipeline run succeeds");

    assert_eq!(report.pages_with(PageOutcome::DownloadSuccessful).len(), 2);
    assert!(dir.path().join("Page_B_confluencePageId=202.pdf").is_file());
    assert!(dir.path().join("Gamma_confluencePageId=203.pdf").is_file());
}

#[tokio::test(start_paused = true)]
async fn success_envelope_serializes_report_with_outcome_keys() {
    let mut api = MockConfluenceApi::new();
    expect_space_resolution(&mut api);
    api.expect_is_empty().returning(|_| Ok(true));

    let mut store = MockBucketStore::new();
    store.expect_clear().returning(|| Ok(()));

    let destination = ExportDestination::Bucket(Arc::new(store));
    let report = export_space(&api, &destination, &test_config(), &CancelFlag::new())
        .await
        .expect("pipeline run succeeds");

    let response = ExportResponse::success(&report);
    assert_eq!(response.status, 1);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(
        json["data"]["EMPTY_PAGE"],
        serde_json::json!([PAGE_A, PAGE_B, PAGE_C])
    );
}
