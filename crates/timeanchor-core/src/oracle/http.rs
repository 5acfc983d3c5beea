//! Scoring oracle backed by an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use indoc::{formatdoc, indoc};
use serde::{Deserialize, Serialize};

use super::{Adjacency, OracleRequest, OracleResponse, ScoringOracle};
use crate::config::OracleConfig;
use crate::error::{OracleError, Result};

const SYSTEM_PROMPT: &str = indoc! {"
    You evaluate how well a flexible task fits an open slot in someone's day.
    Answer with a single JSON object and nothing else:
    {\"task_context\": number 0-12, \"dependency_flow\": number 0-11,
     \"energy_focus\": number 0-10, \"reasoning\": short string}
    task_context: does the slot suit what the task is about?
    dependency_flow: does the task flow well from and into the adjacent events?
    energy_focus: does the slot's time of day match the focus the task needs?
"};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for a chat-completions scoring oracle.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl HttpOracle {
    /// Create a client; `timeout` bounds each HTTP exchange.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            temperature: 0.2,
        })
    }

    /// Build from config, reading the API key from the configured env var.
    ///
    /// An empty endpoint is rejected here so a hybrid run never starts
    /// against nothing.
    pub fn from_config(config: &OracleConfig, timeout: Duration) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(OracleError::Unavailable("no oracle endpoint configured".into()).into());
        }
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "no oracle API key set; requests go out unauthenticated"
            );
        }
        let mut oracle = Self::new(&config.endpoint, &config.model, api_key, timeout)?;
        oracle.temperature = config.temperature;
        Ok(oracle)
    }

    fn build_prompt(request: &OracleRequest) -> String {
        let task = &request.task;
        let slot = &request.slot;

        let neighbours = if request.adjacent_events.is_empty() {
            "none".to_string()
        } else {
            request
                .adjacent_events
                .iter()
                .map(|e| {
                    let side = match e.adjacency {
                        Adjacency::Before => "before",
                        Adjacency::After => "after",
                    };
                    format!(
                        "- [{side}] {} ({} - {})",
                        e.title,
                        e.start_time.format("%H:%M"),
                        e.end_time.format("%H:%M")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        formatdoc! {"
            Task: {title}
            Description: {description}
            Category: {category}
            Priority: {priority}
            Estimated duration: {minutes} minutes
            Preferred time block: {block}
            Energy needed: {energy}

            Slot: {start} - {end} ({slot_minutes} minutes, {gap_type}, {size})

            Adjacent events:
            {neighbours}
            ",
            title = task.title,
            description = if task.description.is_empty() { "-" } else { task.description.as_str() },
            category = if task.category.is_empty() { "-" } else { task.category.as_str() },
            priority = task.priority.as_str(),
            minutes = task.estimated_minutes,
            block = task.preferred_block.map_or("none", |b| b.as_str()),
            energy = task.energy_zone.map_or("unspecified", |z| z.as_str()),
            start = slot.start_time.format("%H:%M"),
            end = slot.end_time.format("%H:%M"),
            slot_minutes = slot.duration_minutes,
            gap_type = slot.gap_type.as_str(),
            size = slot.size.as_str(),
            neighbours = neighbours,
        }
    }
}

#[async_trait]
impl ScoringOracle for HttpOracle {
    fn name(&self) -> &str {
        "http"
    }

    async fn evaluate(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        if self.endpoint.trim().is_empty() {
            return Err(OracleError::Unavailable("no oracle endpoint configured".into()));
        }

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(request),
                },
            ],
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("completion envelope: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Malformed("completion has no content".into()))?;

        let mut verdict: OracleResponse = serde_json::from_str(content.trim())
            .map_err(|e| OracleError::Malformed(format!("verdict: {e}")))?;
        if verdict.model_id.is_empty() {
            verdict.model_id = completion.model.unwrap_or_else(|| self.model.clone());
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::task::{Priority, TaskToAnchor, TimeBlock};
    use crate::timeline::{AvailableSlot, GapSize, GapType};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn sample_request() -> OracleRequest {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();
        let slot = AvailableSlot {
            id: "slot-01".into(),
            start_time: start,
            end_time: start + ChronoDuration::minutes(60),
            gap_type: GapType::Morning,
            size: GapSize::Medium,
            preceding_event_id: None,
            following_event_id: None,
        };
        let task = TaskToAnchor::new("t1", "Draft quarterly plan", 50)
            .with_priority(Priority::High)
            .with_preferred_block(TimeBlock::Peak);
        OracleRequest::new(&task, &slot, &[])
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "model": "test-model-1",
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    #[test]
    fn test_prompt_mentions_task_and_slot() {
        let prompt = HttpOracle::build_prompt(&sample_request());
        assert!(prompt.contains("Task: Draft quarterly plan"));
        assert!(prompt.contains("Preferred time block: peak"));
        assert!(prompt.contains("Slot: 09:30 - 10:30 (60 minutes, morning, medium)"));
        assert!(prompt.contains("Adjacent events:\nnone"));
    }

    #[tokio::test]
    async fn test_evaluate_parses_verdict() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(
                r#"{"task_context": 10, "dependency_flow": 8, "energy_focus": 9, "reasoning": "Quiet morning"}"#,
            ))
            .create_async()
            .await;

        let oracle = HttpOracle::new(
            format!("{}/v1/chat/completions", server.url()),
            "test-model",
            Some("test-key".into()),
            Duration::from_secs(5),
        )
        .unwrap();

        let verdict = oracle.evaluate(&sample_request()).await.unwrap();
        assert_eq!(verdict.task_context, 10.0);
        assert_eq!(verdict.reasoning, "Quiet morning");
        assert_eq!(verdict.model_id, "test-model-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let oracle =
            HttpOracle::new(format!("{}/chat", server.url()), "m", None, Duration::from_secs(5))
                .unwrap();
        let err = oracle.evaluate(&sample_request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_non_json_content_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(completion("I think this slot is fine."))
            .create_async()
            .await;

        let oracle =
            HttpOracle::new(format!("{}/chat", server.url()), "m", None, Duration::from_secs(5))
                .unwrap();
        let err = oracle.evaluate(&sample_request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_from_config_rejects_empty_endpoint() {
        let config = OracleConfig {
            endpoint: "  ".into(),
            ..OracleConfig::default()
        };
        let err = HttpOracle::from_config(&config, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, CoreError::Oracle(OracleError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_unavailable() {
        let oracle = HttpOracle::new("", "m", None, Duration::from_secs(1)).unwrap();
        let err = oracle.evaluate(&sample_request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }
}
