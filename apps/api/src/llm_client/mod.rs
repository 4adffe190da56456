/// LLM Client: the single point of entry for all completion-service calls.
///
/// No other module may call the generative-language API directly; everything
/// goes through the `Completer` trait so analyses and batches can be driven by
/// a scripted completer in tests.
///
/// Model: gemini-1.5-flash (hardcoded to keep prompt/parser behaviour stable)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod retry;

use retry::{RetryError, RetryPolicy};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// The model used for all completions.
pub const MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("completion request failed: {0}")]
    Failed(String),

    #[error("completion service returned no text")]
    EmptyContent,
}

/// The text-completion seam: `complete(prompt) -> text`.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Outcome of a single HTTP attempt, before the retry policy decides.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("HTTP 429 from completion service")]
    Throttled,
    #[error(transparent)]
    Fatal(#[from] CompletionError),
}

/// Completion client for the Gemini `generateContent` endpoint.
/// Retries only on HTTP 429; everything else fails on the first attempt.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_key: String, timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            retry,
        })
    }

    /// Points the client at a different host (proxies, local stubs).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, MODEL
        )
    }

    async fn attempt(&self, prompt: &str) -> Result<String, AttemptError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Failed(describe_transport_error(&e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Completion service returned 429");
            return Err(AttemptError::Throttled);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Completion service error body: {body}");
            return Err(CompletionError::Failed(format!("service returned HTTP {status}")).into());
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Failed(format!("invalid response body: {e}")))?;

        let text = parsed.text().ok_or(CompletionError::EmptyContent)?;
        debug!("Completion succeeded: {} chars", text.len());
        Ok(text)
    }
}

#[async_trait]
impl Completer for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.retry
            .run(
                |_| self.attempt(prompt),
                |e| matches!(e, AttemptError::Throttled),
            )
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, last } => {
                    warn!("Giving up on completion after {attempts} attempts: {last}");
                    CompletionError::RateLimited { attempts }
                }
                RetryError::Fatal(AttemptError::Fatal(inner)) => inner,
                RetryError::Fatal(AttemptError::Throttled) => {
                    CompletionError::RateLimited { attempts: 1 }
                }
            })
    }
}

/// Hides the request URL (which carries the API key) from error messages.
fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "could not connect to completion service".to_string()
    } else {
        match e.url() {
            Some(url) => e.to_string().replace(url.as_str(), "<completion endpoint>"),
            None => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::retry::Backoff;
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Serves a scripted sequence of statuses; the final entry repeats.
    async fn spawn_stub(statuses: Vec<u16>) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let script = Arc::new(statuses);

        async fn handler(
            State((hits, script)): State<(Arc<AtomicU32>, Arc<Vec<u16>>)>,
        ) -> (AxumStatus, Json<Value>) {
            let n = hits.fetch_add(1, Ordering::SeqCst) as usize;
            let code = script[n.min(script.len() - 1)];
            let status = AxumStatus::from_u16(code).unwrap();
            if status.is_success() {
                (
                    status,
                    Json(json!({
                        "candidates": [{"content": {"parts": [{"text": "**Match Percentage**: 80%"}]}}]
                    })),
                )
            } else {
                (status, Json(json!({"error": {"message": "nope"}})))
            }
        }

        let app = Router::new()
            .route("/v1beta/models/:model", post(handler))
            .with_state((hits.clone(), script));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn client(base: &str) -> GeminiClient {
        GeminiClient::new(
            "test-key".into(),
            Duration::from_secs(10),
            RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(10))),
        )
        .unwrap()
        .with_base_url(base)
    }

    #[test]
    fn test_response_text_concatenates_first_candidate_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let parsed: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn test_endpoint_uses_fixed_model() {
        let c = client("http://localhost:9/");
        assert_eq!(
            c.endpoint(),
            "http://localhost:9/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_two_429s_then_success_is_transparent() {
        let (base, hits) = spawn_stub(vec![429, 429, 200]).await;
        let text = client(&base).complete("prompt").await.unwrap();
        assert_eq!(text, "**Match Percentage**: 80%");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_429_fails_after_three_attempts() {
        let (base, hits) = spawn_stub(vec![429, 429, 429, 429]).await;
        let err = client(&base).complete("prompt").await.unwrap_err();
        assert!(matches!(err, CompletionError::RateLimited { attempts: 3 }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let (base, hits) = spawn_stub(vec![500, 200]).await;
        let err = client(&base).complete("prompt").await.unwrap_err();
        assert!(matches!(err, CompletionError::Failed(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_fails_without_leaking_key() {
        // Port 9 (discard) is closed on CI hosts.
        let err = client("http://127.0.0.1:9").complete("prompt").await.unwrap_err();
        match err {
            CompletionError::Failed(msg) => assert!(!msg.contains("test-key")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
