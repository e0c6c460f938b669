//! User-Agent strings for the tool's own HTTP traffic.
//!
//! Browser-backed fetches replay the browser's user-agent instead; these are
//! only used for plain fetches and oracle requests.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/bibharvest";

/// Default User-Agent for direct PDF fetches.
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bibharvest/{version} (academic-research-tool; +{PROJECT_UA_URL})")
}

/// Default User-Agent for classification oracle requests.
#[must_use]
pub(crate) fn default_oracle_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bibharvest/{version} (research-tool; +{PROJECT_UA_URL})")
}
