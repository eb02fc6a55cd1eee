//! Client for the hosted reasoning model.
//!
//! The service sees a prompt built from the extracted context and must reply
//! with a small JSON object. Replies are decoded here, including the older
//! single-issue shape, so the rest of the crate only ever sees
//! [`CheckOutcome`] and [`HintOutcome`].

use crate::config::Config;
use crate::error::{NotebookError, Result};
use crate::models::{CheckOutcome, CheckRequest, HintOutcome, HintRequest, StepIssue};
use crate::prompt::{self, ImageSource, PromptBlock, PromptMode, ReasoningPrompt};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const CHECK_MAX_TOKENS: u32 = 1024;
const HINT_MAX_TOKENS: u32 = 512;

#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn check_reasoning(&self, request: &CheckRequest) -> Result<CheckOutcome>;
    async fn get_hint(&self, request: &HintRequest) -> Result<HintOutcome>;
}

// ============================================================================
// Messages API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: WireImageSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl From<&PromptBlock> for ContentBlock {
    fn from(block: &PromptBlock) -> Self {
        match block {
            PromptBlock::Text(text) => ContentBlock::Text { text: text.clone() },
            PromptBlock::Image(ImageSource::Base64 { media_type, data }) => ContentBlock::Image {
                source: WireImageSource::Base64 {
                    media_type: media_type.clone(),
                    data: data.clone(),
                },
            },
            PromptBlock::Image(ImageSource::Url(url)) => ContentBlock::Image {
                source: WireImageSource::Url { url: url.clone() },
            },
        }
    }
}

// ============================================================================
// Reply Decoding
// ============================================================================

/// Issue as the model writes it. Older replies used `message` for the text.
#[derive(Debug, Deserialize)]
struct WireIssue {
    #[serde(rename = "stepIndex")]
    step_index: usize,
    #[serde(alias = "message", default)]
    latex: String,
}

/// Body of an `issue` reply: the current list form or the legacy single pair.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IssuePayload {
    List { issues: Vec<WireIssue> },
    Single(WireIssue),
}

impl IssuePayload {
    fn into_issues(self) -> Vec<StepIssue> {
        let wire = match self {
            IssuePayload::List { issues } => issues,
            IssuePayload::Single(issue) => vec![issue],
        };
        wire.into_iter()
            .map(|w| StepIssue {
                step_index: w.step_index,
                message: w.latex,
            })
            .collect()
    }
}

/// Find the first JSON object in a reply that carries `key`.
///
/// Replies may wrap the JSON in prose or a code fence, and that prose often
/// holds LaTeX such as `\frac{x}{2}`, so every `{` is tried as a start and
/// parsing stops at the end of the first complete value.
pub fn find_json_object(text: &str, key: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) if value.get(key).is_some() => Some(value),
            _ => None,
        }
    })
}

pub fn decode_check_reply(text: &str) -> Result<CheckOutcome> {
    let value = find_json_object(text, "status").ok_or_else(|| {
        NotebookError::Upstream("reply did not contain a JSON verdict".to_string())
    })?;

    let status = value
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| NotebookError::Upstream("reply has no status".to_string()))?;

    match status {
        "ok" => Ok(CheckOutcome::Ok),
        "issue" => {
            let payload: IssuePayload = serde_json::from_value(value.clone()).map_err(|e| {
                NotebookError::Upstream(format!("issue reply has an unexpected shape: {}", e))
            })?;
            Ok(CheckOutcome::Issue {
                issues: payload.into_issues(),
            })
        }
        other => Err(NotebookError::Upstream(format!(
            "reply has unknown status '{}'",
            other
        ))),
    }
}

pub fn decode_hint_reply(text: &str) -> Result<HintOutcome> {
    if let Some(value) = find_json_object(text, "hint") {
        if let Some(hint) = value.get("hint").and_then(Value::as_str) {
            let hint = hint.trim();
            if hint.is_empty() {
                return Err(NotebookError::Upstream("reply contained an empty hint".to_string()));
            }
            return Ok(HintOutcome {
                text: hint.to_string(),
            });
        }
    }

    let plain = text.trim();
    if plain.is_empty() {
        return Err(NotebookError::Upstream("reply was empty".to_string()));
    }
    Ok(HintOutcome {
        text: plain.to_string(),
    })
}

// ============================================================================
// Anthropic Client
// ============================================================================

pub struct AnthropicReasoningClient {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl AnthropicReasoningClient {
    pub fn new(api_key: Option<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api_key.clone(),
            config.api_url.as_str(),
            config.model.clone(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn credential(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            NotebookError::Configuration("ANTHROPIC_API_KEY is not set".to_string())
        })
    }

    /// Send a prompt and return the concatenated text of the reply.
    async fn complete(&self, prompt: &ReasoningPrompt, max_tokens: u32) -> Result<String> {
        let api_key = self.credential()?;

        let body = MessageRequest {
            model: &self.model,
            max_tokens,
            system: &prompt.system,
            messages: vec![Message {
                role: "user",
                content: prompt.blocks.iter().map(ContentBlock::from).collect(),
            }],
        };

        tracing::debug!(
            mode = ?prompt.mode,
            blocks = prompt.blocks.len(),
            images = prompt.image_count(),
            "sending prompt to reasoning service"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotebookError::Upstream(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = match serde_json::from_str::<ApiError>(&error_text) {
                Ok(api_error) => api_error.error.message,
                Err(_) => error_text,
            };
            return Err(NotebookError::Upstream(format!("{}: {}", status, message)));
        }

        let reply: MessageResponse = response
            .json()
            .await
            .map_err(|e| NotebookError::Upstream(format!("Failed to parse response: {}", e)))?;

        let text: String = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(NotebookError::Upstream("reply had no text content".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl ReasoningService for AnthropicReasoningClient {
    async fn check_reasoning(&self, request: &CheckRequest) -> Result<CheckOutcome> {
        self.credential()?;
        if request.user_lines.is_empty() {
            return Err(NotebookError::Validation(
                "there are no work lines to check".to_string(),
            ));
        }

        let prompt = prompt::build(
            &request.problem_lines,
            &request.user_lines,
            &request.hints,
            &Default::default(),
            PromptMode::Check,
        );
        let reply = self.complete(&prompt, CHECK_MAX_TOKENS).await?;
        let outcome = decode_check_reply(&reply)?;

        match &outcome {
            CheckOutcome::Ok => tracing::info!(steps = request.user_lines.len(), "check passed"),
            CheckOutcome::Issue { issues } => tracing::info!(
                steps = request.user_lines.len(),
                issues = issues.len(),
                "check found issues"
            ),
        }
        Ok(outcome)
    }

    async fn get_hint(&self, request: &HintRequest) -> Result<HintOutcome> {
        self.credential()?;

        let prompt = prompt::build(
            &request.problem_lines,
            &request.user_lines,
            &Default::default(),
            &request.feedback,
            PromptMode::Hint,
        );
        let reply = self.complete(&prompt, HINT_MAX_TOKENS).await?;
        decode_hint_reply(&reply)
    }
}

impl std::fmt::Debug for AnthropicReasoningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicReasoningClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineId, LineKind, WorkLine};

    fn unconfigured() -> AnthropicReasoningClient {
        AnthropicReasoningClient::new(None, "http://127.0.0.1:9/v1/messages", "test-model")
    }

    #[test]
    fn test_decode_ok_reply() {
        assert_eq!(decode_check_reply(r#"{"status": "ok"}"#).unwrap(), CheckOutcome::Ok);
    }

    #[test]
    fn test_decode_issue_list() {
        let outcome = decode_check_reply(
            r#"{"status": "issue", "issues": [{"stepIndex": 2, "latex": "$3 \\neq 2$"}, {"stepIndex": 3, "latex": "follows from step 2"}]}"#,
        )
        .unwrap();
        match outcome {
            CheckOutcome::Issue { issues } => {
                assert_eq!(issues.len(), 2);
                assert_eq!(issues[0].step_index, 2);
                assert_eq!(issues[0].message, "$3 \\neq 2$");
                assert_eq!(issues[1].step_index, 3);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_single_issue() {
        let outcome =
            decode_check_reply(r#"{"status": "issue", "stepIndex": 1, "message": "wrong sign"}"#)
                .unwrap();
        assert_eq!(
            outcome,
            CheckOutcome::Issue {
                issues: vec![StepIssue {
                    step_index: 1,
                    message: "wrong sign".to_string()
                }]
            }
        );
    }

    #[test]
    fn test_decode_tolerates_code_fence() {
        let reply = "Here is my verdict:\n```json\n{\"status\": \"ok\"}\n```";
        assert_eq!(decode_check_reply(reply).unwrap(), CheckOutcome::Ok);
    }

    #[test]
    fn test_decode_skips_latex_braces_in_prose() {
        let before = "Step 2 should read $\\frac{x}{2} = 2$.\n{\"status\": \"issue\", \"issues\": [{\"stepIndex\": 2, \"latex\": \"$\\\\frac{x}{2}$\"}]}";
        match decode_check_reply(before).unwrap() {
            CheckOutcome::Issue { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].step_index, 2);
                assert_eq!(issues[0].message, "$\\frac{x}{2}$");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let after = "{\"status\": \"ok\"}\nEvery step holds, e.g. $x^{2} = 4$ and $\\{2\\}$.";
        assert_eq!(decode_check_reply(after).unwrap(), CheckOutcome::Ok);

        let empty_group = "Note $\\frac{}{}$ first. {\"status\": \"ok\"}";
        assert_eq!(decode_check_reply(empty_group).unwrap(), CheckOutcome::Ok);
    }

    #[test]
    fn test_decode_hint_with_braces_in_prose() {
        let reply = "Think about $x^{2}$:\n{\"hint\": \"Take the square root of both sides.\"}";
        assert_eq!(
            decode_hint_reply(reply).unwrap().text,
            "Take the square root of both sides."
        );
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        for reply in [
            "no json here",
            r#"{"status": "maybe"}"#,
            r#"{"verdict": "ok"}"#,
            r#"{"status": "issue"}"#,
            r#"{"status": "issue", "issues": [{"latex": "missing index"}]}"#,
            "{not json}",
        ] {
            assert!(
                matches!(decode_check_reply(reply), Err(NotebookError::Upstream(_))),
                "accepted: {}",
                reply
            );
        }
    }

    #[test]
    fn test_decode_hint_reply() {
        assert_eq!(
            decode_hint_reply(r#"{"hint": "  Try isolating $x$. "}"#).unwrap().text,
            "Try isolating $x$."
        );
        assert_eq!(
            decode_hint_reply("Subtract 3 from both sides.").unwrap().text,
            "Subtract 3 from both sides."
        );
        assert!(decode_hint_reply("   ").is_err());
        assert!(decode_hint_reply(r#"{"hint": ""}"#).is_err());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_any_call() {
        let client = unconfigured();
        assert!(!client.is_configured());
        let request = CheckRequest {
            user_lines: vec![WorkLine {
                mode: LineKind::Math,
                content: "x=1".to_string(),
                line_id: LineId::from("a"),
            }],
            ..Default::default()
        };
        assert!(matches!(
            client.check_reasoning(&request).await,
            Err(NotebookError::Configuration(_))
        ));
        assert!(matches!(
            client.get_hint(&HintRequest::default()).await,
            Err(NotebookError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_work_is_rejected_without_call() {
        // Unroutable endpoint: reaching the network would surface as Upstream.
        let client = AnthropicReasoningClient::new(
            Some("sk-test".to_string()),
            "http://127.0.0.1:9/v1/messages",
            "test-model",
        );
        assert!(matches!(
            client.check_reasoning(&CheckRequest::default()).await,
            Err(NotebookError::Validation(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = AnthropicReasoningClient::new(
            Some("sk-secret".to_string()),
            "https://api.anthropic.com/v1/messages",
            "m",
        );
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
