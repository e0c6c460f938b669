//! Client for the reference classification oracle.
//!
//! The oracle is any OpenAI-compatible chat-completion endpoint. Each
//! reference line becomes one request; the reply must be a JSON
//! [`Article`].

mod prompt;

pub use prompt::build_prompt;

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::OracleConfig;
use crate::user_agent;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Errors talking to the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The HTTP client could not be constructed.
    #[error("failed to build oracle client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    /// Transport failure.
    #[error("oracle request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("oracle returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The completion has no message content.
    #[error("oracle reply has no content")]
    EmptyReply,

    /// The content is not a valid article object.
    #[error("oracle reply is not a valid article: {reason}")]
    InvalidReply { reason: String },
}

/// Relevance category assigned by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Survey,
    Technical,
    Benchmark,
    Irrelevant,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::Technical => "technical",
            Self::Benchmark => "benchmark",
            Self::Irrelevant => "irrelevant",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified reference, one line of `result.jsonl`.
///
/// `authors` and `year` are read leniently: models often answer with a single
/// author string or a quoted year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default, deserialize_with = "lenient_authors")]
    pub authors: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<u32>,
    pub category: Category,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AuthorsField {
    List(Vec<String>),
    One(String),
    Missing(()),
}

fn lenient_authors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match AuthorsField::deserialize(deserializer)? {
        AuthorsField::List(authors) => authors,
        AuthorsField::One(author) if author.trim().is_empty() => Vec::new(),
        AuthorsField::One(author) => vec![author.trim().to_string()],
        AuthorsField::Missing(()) => Vec::new(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearField {
    Number(u32),
    Text(String),
    Missing(()),
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match YearField::deserialize(deserializer)? {
        YearField::Number(year) => Some(year),
        YearField::Text(text) => text.trim().parse().ok(),
        YearField::Missing(()) => None,
    })
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completion client bound to one model.
#[derive(Debug, Clone)]
pub struct OracleClient {
    client: Client,
    config: OracleConfig,
}

impl OracleClient {
    /// # Errors
    ///
    /// Returns [`OracleError::ClientBuild`] if reqwest rejects the configuration.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent::default_oracle_user_agent())
            .build()
            .map_err(|source| OracleError::ClientBuild { source })?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Classifies one reference line.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] on transport failure, a non-success status, or
    /// a reply that is not an [`Article`] object.
    #[instrument(skip(self, item), fields(model = %self.config.model))]
    pub async fn classify(&self, item: &str) -> Result<Article, OracleError> {
        let url = self.endpoint();
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": prompt::SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(item)},
            ],
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| OracleError::Network {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let completion: Completion = response
            .json()
            .await
            .map_err(|source| OracleError::Network { url, source })?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(OracleError::EmptyReply)?;
        debug!(chars = content.len(), "oracle replied");
        parse_article(&content)
    }
}

/// Parses an oracle reply, tolerating a surrounding Markdown code fence.
///
/// # Errors
///
/// Returns [`OracleError::InvalidReply`] when the text is not an article object.
pub fn parse_article(content: &str) -> Result<Article, OracleError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim()).map_err(|e| OracleError::InvalidReply {
        reason: e.to_string(),
    })
}
