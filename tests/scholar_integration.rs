//! The five-stage citation search against scripted result pages.

mod support;

use std::sync::Arc;
use std::time::Duration;

use bibharvest_core::scholar::DEFAULT_SEARCH_TEMPLATE;
use bibharvest_core::{CitationSearchAutomaton, HarvestOutcome, SearchSettings};
use serde_json::json;
use support::fake_browser::{FakeLauncher, FakePage};

const EXPORT_URL: &str = "https://scholar.example/scholar.bib?q=info:abc";

const LOCATE: &str = "return result !== null";
const METADATA: &str = ".gs_rs";
const REQUEST: &str = ".gs_or_cit.gs_nph";
const EXPORT: &str = "#gs_citi";

fn automaton(launcher: Arc<FakeLauncher>) -> CitationSearchAutomaton {
    CitationSearchAutomaton::new(
        launcher,
        SearchSettings {
            template: DEFAULT_SEARCH_TEMPLATE.to_string(),
            export_settle: Duration::ZERO,
        },
    )
}

fn result_page() -> FakePage {
    FakePage::new()
        .on(LOCATE, json!(true))
        .on(
            METADATA,
            json!({"abstract": "We repair programs.", "url": "https://pub.example/repair"}),
        )
        .on(REQUEST, json!(true))
        .on(EXPORT, json!(EXPORT_URL))
}

#[tokio::test]
async fn test_search_exports_record_and_merges_metadata() {
    let page = result_page().source(
        EXPORT_URL,
        "<html><body><pre>@article{lee2021repair,\n  title={Neural Repair},\n  \
         url={https://doi.example/10.1/x},\n  year={2021}\n}</pre></body></html>",
    );
    let launcher = Arc::new(FakeLauncher::new(page));
    let activity = launcher.activity();

    let records = match automaton(launcher).search("Neural\n  Repair").await {
        HarvestOutcome::Success(records) => records,
        other => panic!("expected success, got {}", other.label()),
    };
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.key, "lee2021repair");
    assert_eq!(record.get("abstract"), Some("We repair programs."));
    assert_eq!(record.get("url"), Some("https://doi.example/10.1/x"));

    let activity = activity.lock().unwrap();
    assert_eq!(activity.opened.len(), 1);
    assert!(activity.opened[0].contains("q=Neural%20Repair"));
    assert_eq!(activity.navigated, vec![EXPORT_URL.to_string()]);
    assert_eq!(activity.closed, 1);
}

#[tokio::test]
async fn test_zero_results_is_not_found() {
    let launcher = Arc::new(FakeLauncher::new(FakePage::new().on(LOCATE, json!(false))));
    let activity = launcher.activity();
    let outcome = automaton(launcher).search("nothing matches this").await;
    assert!(outcome.is_not_found());
    assert_eq!(activity.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_result_vanishing_before_metadata_is_error() {
    let launcher = Arc::new(FakeLauncher::new(FakePage::new().on(LOCATE, json!(true))));
    let activity = launcher.activity();
    let outcome = automaton(launcher).search("flaky page").await;
    assert!(matches!(outcome, HarvestOutcome::Error(_)));
    assert_eq!(activity.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_missing_export_link_is_not_found() {
    let page = FakePage::new()
        .on(LOCATE, json!(true))
        .on(METADATA, json!({"abstract": null, "url": null}))
        .on(REQUEST, json!(false));
    let launcher = Arc::new(FakeLauncher::new(page));
    let activity = launcher.activity();
    let outcome = automaton(launcher).search("no cite button").await;
    assert!(outcome.is_not_found());
    let activity = activity.lock().unwrap();
    assert!(activity.navigated.is_empty());
    assert_eq!(activity.closed, 1);
}

#[tokio::test]
async fn test_result_gone_at_export_request_is_not_found() {
    let page = FakePage::new()
        .on(LOCATE, json!(true))
        .on(METADATA, json!({"abstract": "Kept?", "url": null}))
        .on(REQUEST, json!(null))
        .on(EXPORT, json!(EXPORT_URL));
    let launcher = Arc::new(FakeLauncher::new(page));
    let activity = launcher.activity();
    let automaton = CitationSearchAutomaton::new(
        launcher,
        SearchSettings {
            template: DEFAULT_SEARCH_TEMPLATE.to_string(),
            export_settle: Duration::from_secs(3600),
        },
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), automaton.search("reflowed"))
        .await
        .expect("export settle must be skipped");
    assert!(outcome.is_not_found());
    let activity = activity.lock().unwrap();
    assert!(activity.navigated.is_empty());
    assert!(!activity.scripts.iter().any(|script| script.contains("#gs_citi")));
    assert_eq!(activity.closed, 1);
}

#[tokio::test]
async fn test_export_page_without_record_is_not_found() {
    let page = result_page().source(
        EXPORT_URL,
        "<html><body>Please show you're not a robot</body></html>",
    );
    let launcher = Arc::new(FakeLauncher::new(page));
    let outcome = automaton(launcher).search("captcha").await;
    assert!(outcome.is_not_found());
}

#[tokio::test]
async fn test_script_failure_is_error_and_session_closed() {
    let page = FakePage::new()
        .on(LOCATE, json!(true))
        .fail_on(METADATA, "target closed");
    let launcher = Arc::new(FakeLauncher::new(page));
    let activity = launcher.activity();
    let outcome = automaton(launcher).search("crash").await;
    let HarvestOutcome::Error(reason) = outcome else {
        panic!("expected error");
    };
    assert!(reason.contains("target closed"));
    assert_eq!(activity.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_launch_failure_is_error() {
    let outcome = automaton(Arc::new(FakeLauncher::broken()))
        .search("anything")
        .await;
    assert!(matches!(outcome, HarvestOutcome::Error(_)));
}
