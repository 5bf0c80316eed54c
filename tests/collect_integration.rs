//! Live-portal integration tests.
//!
//! These hit the real KOEN portal and are marked #[ignore] so normal
//! builds never depend on its availability. Run manually with:
//!
//!   cargo test --test collect_integration -- --ignored
//!
//! The portal serves historical data only; the fixed past window below
//! keeps the tests deterministic.

use chrono::NaiveDate;

use pvcollect_service::config::CollectorConfig;
use pvcollect_service::ingest::koenergy::{KoenergyClient, WindowFetcher};
use pvcollect_service::ingest::validate::{classify, WindowPayload};
use pvcollect_service::model::{DateWindow, FetchFilters};

fn past_window() -> DateWindow {
    DateWindow {
        start: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 11, 2).unwrap(),
    }
}

#[test]
fn test_client_builds_from_default_config() {
    // No network; verifies the cookie-store client and URL wiring.
    let client = KoenergyClient::new(&CollectorConfig::default());
    assert!(client.is_ok(), "default config should produce a working client");
}

#[test]
#[ignore] // Don't run in CI - depends on the external portal
fn portal_answers_priming_and_data_requests() {
    let mut client = KoenergyClient::new(&CollectorConfig::default()).unwrap();
    let raw = client
        .fetch_window(&FetchFilters::all(), &past_window())
        .expect("both portal requests should succeed at the transport level");

    assert!(!raw.content_type.is_empty(), "portal should declare a content type");
    assert!(!raw.body.is_empty(), "portal should return a body");
}

#[test]
#[ignore] // Don't run in CI - depends on the external portal
fn portal_response_classifies_cleanly() {
    let mut client = KoenergyClient::new(&CollectorConfig::default()).unwrap();
    let window = past_window();
    let raw = client.fetch_window(&FetchFilters::all(), &window).unwrap();

    match classify(&window, &raw) {
        WindowPayload::Accepted(batch) => {
            assert!(
                !batch.schema.headers.is_empty(),
                "accepted payload should have a header row"
            );
        }
        WindowPayload::Rejected { diagnostic, .. } => {
            // A rejection is a legitimate portal answer (e.g. session
            // HTML); the diagnostic must still identify the window.
            assert!(
                diagnostic.contains(&window.to_string()),
                "diagnostic should carry the window bounds: {}",
                diagnostic
            );
        }
        WindowPayload::Unparseable { detail } => {
            panic!("portal CSV should parse; format drift? {}", detail);
        }
    }
}

#[test]
#[ignore] // Don't run in CI - depends on the external portal
fn portal_honors_plant_filter() {
    let mut client = KoenergyClient::new(&CollectorConfig::default()).unwrap();
    let raw = client
        .fetch_window(&FetchFilters::for_plant("84S1"), &past_window())
        .expect("filtered request should succeed at the transport level");
    assert!(!raw.body.is_empty());
}
