//! Reference enumeration against scripted article pages.

mod support;

use bibharvest_core::extract::ExtractError;
use bibharvest_core::{ReferenceExtractor, SessionLauncher, SiteVariant};
use serde_json::json;
use support::fake_browser::{FakeLauncher, FakePage};

async fn collect(site: SiteVariant, page: FakePage) -> Result<Vec<String>, ExtractError> {
    let launcher = FakeLauncher::new(page);
    let mut session = launcher.open("https://example.test/article").await.unwrap();
    ReferenceExtractor::new(site).collect(session.as_mut()).await
}

#[tokio::test]
async fn test_springer_stops_at_first_missing_index() {
    let page = FakePage::new()
        .on(r#""ref-CR1""#, json!("Alpha, A.: First.\n"))
        .on(r#""ref-CR2""#, json!("  Beta, B.: Second."))
        .on(r#""ref-CR3""#, json!("Gamma, C.: Third."))
        // index 4 is absent, index 5 must never be read
        .on(r#""ref-CR5""#, json!("Epsilon"));
    let references = collect(SiteVariant::Springer, page).await.unwrap();
    assert_eq!(
        references,
        vec!["Alpha, A.: First.", "Beta, B.: Second.", "Gamma, C.: Third."]
    );
}

#[tokio::test]
async fn test_missing_first_index_yields_empty_list() {
    let page = FakePage::new().on(r#""bib.bib2""#, json!("Second only"));
    let references = collect(SiteVariant::Arxiv, page).await.unwrap();
    assert!(references.is_empty());
}

#[tokio::test]
async fn test_acm_emits_blank_for_empty_element() {
    let page = FakePage::new()
        .on("#ref-00001 ", json!("One"))
        .on("#ref-00002 ", json!(" \n "))
        .on("#ref-00003 ", json!("Three"));
    let references = collect(SiteVariant::Acm, page).await.unwrap();
    assert_eq!(references, vec!["One", "", "Three"]);
}

#[tokio::test]
async fn test_arxiv_skips_empty_element_and_rewrites_arrow() {
    let page = FakePage::new()
        .on(r#""bib.bib1""#, json!("Ref one \u{2191} back"))
        .on(r#""bib.bib2""#, json!(""))
        .on(r#""bib.bib3""#, json!("Ref three"));
    let references = collect(SiteVariant::Arxiv, page).await.unwrap();
    assert_eq!(references, vec!["Ref one ; back", "Ref three"]);
}

#[tokio::test]
async fn test_springer_empty_element_terminates() {
    let page = FakePage::new()
        .on(r#""ref-CR1""#, json!("One"))
        .on(r#""ref-CR2""#, json!(""))
        .on(r#""ref-CR3""#, json!("Three"));
    let references = collect(SiteVariant::Springer, page).await.unwrap();
    assert_eq!(references, vec!["One"]);
}

#[tokio::test]
async fn test_failure_midway_discards_partial_list() {
    let page = FakePage::new()
        .on(r#""ref-CR1""#, json!("One"))
        .on(r#""ref-CR2""#, json!("Two"))
        .fail_on(r#""ref-CR3""#, "execution context destroyed");
    let err = collect(SiteVariant::Springer, page).await.unwrap_err();
    assert!(matches!(err, ExtractError::Browser { index: 3, .. }));
}

#[tokio::test]
async fn test_cursor_is_lazy_and_never_restarts() {
    let launcher = FakeLauncher::new(
        FakePage::new()
            .on(r#""ref-CR1""#, json!("One"))
            .on(r#""ref-CR2""#, json!("Two")),
    );
    let activity = launcher.activity();
    let mut session = launcher.open("https://example.test/a").await.unwrap();
    let extractor = ReferenceExtractor::new(SiteVariant::Springer);
    let mut cursor = extractor.references(session.as_mut());

    assert_eq!(cursor.next_reference().await.unwrap().as_deref(), Some("One"));
    assert_eq!(activity.lock().unwrap().scripts.len(), 1);
    assert_eq!(cursor.next_reference().await.unwrap().as_deref(), Some("Two"));
    assert_eq!(cursor.next_reference().await.unwrap(), None);
    assert_eq!(cursor.next_reference().await.unwrap(), None);
    assert_eq!(cursor.position(), 4);
    assert_eq!(activity.lock().unwrap().scripts.len(), 3);
}

#[tokio::test]
async fn test_cited_by_drops_blank_items() {
    let launcher = FakeLauncher::new(
        FakePage::new().on("#core-cited-by", json!(["Citing one\n", "  ", "Citing two"])),
    );
    let mut session = launcher.open("https://dl.acm.org/doi/10.1/x").await.unwrap();
    let cited_by = ReferenceExtractor::new(SiteVariant::Acm)
        .cited_by(session.as_mut())
        .await
        .unwrap();
    assert_eq!(cited_by, vec!["Citing one", "Citing two"]);
}

#[tokio::test]
async fn test_cited_by_absent_list_is_empty() {
    let launcher = FakeLauncher::new(FakePage::new());
    let mut session = launcher.open("https://dl.acm.org/doi/10.1/x").await.unwrap();
    let cited_by = ReferenceExtractor::new(SiteVariant::Acm)
        .cited_by(session.as_mut())
        .await
        .unwrap();
    assert!(cited_by.is_empty());
}
