//! Quality gate for draft replies.
//!
//! The evaluator backend is asked for a strict `evaluation` JSON object; the
//! returned text is validated against the same schema and decoded into an
//! [`Evaluation`]. A payload that does not match is a hard error for the turn.

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::core::completion::{CompletionClient, CompletionRequest, RequestError, ResponseSchema};
use crate::core::message::Message;
use crate::core::prompt::build_evaluator_user_prompt;

pub const EVALUATION_SCHEMA_NAME: &str = "evaluation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(alias = "isAcceptable")]
    pub is_acceptable: bool,
    pub feedback: String,
}

pub fn evaluation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_acceptable": {
                "type": "boolean",
                "description": "Whether or not the response is acceptable"
            },
            "feedback": {
                "type": "string",
                "description": "Feedback on the response quality"
            }
        },
        "required": ["is_acceptable", "feedback"],
        "additionalProperties": false
    })
}

/// Why the evaluator payload could not be turned into an [`Evaluation`].
#[derive(Debug)]
pub enum DecodeError {
    /// The text is not JSON at all.
    Syntax {
        source: serde_json::Error,
        payload: String,
    },

    /// Valid JSON that does not have the two-field evaluation shape.
    Shape { problems: Vec<String>, payload: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Syntax { source, payload } => {
                write!(f, "evaluation is not valid JSON ({source}): {payload}")
            }
            DecodeError::Shape { problems, payload } => {
                write!(
                    f,
                    "evaluation does not match the schema ({}): {payload}",
                    problems.join("; ")
                )
            }
        }
    }
}

impl StdError for DecodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DecodeError::Syntax { source, .. } => Some(source),
            DecodeError::Shape { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum EvaluationError {
    Request(RequestError),
    Decode(DecodeError),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::Request(err) => write!(f, "evaluator request failed: {err}"),
            EvaluationError::Decode(err) => write!(f, "failed to parse evaluation: {err}"),
        }
    }
}

impl StdError for EvaluationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            EvaluationError::Request(err) => Some(err),
            EvaluationError::Decode(err) => Some(err),
        }
    }
}

impl From<RequestError> for EvaluationError {
    fn from(err: RequestError) -> Self {
        EvaluationError::Request(err)
    }
}

impl From<DecodeError> for EvaluationError {
    fn from(err: DecodeError) -> Self {
        EvaluationError::Decode(err)
    }
}

fn schema_validator() -> Option<&'static jsonschema::Validator> {
    static VALIDATOR: OnceLock<Option<jsonschema::Validator>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| match jsonschema::validator_for(&evaluation_schema()) {
            Ok(validator) => Some(validator),
            Err(err) => {
                warn!(error = %err, "evaluation schema failed to compile; relying on serde only");
                None
            }
        })
        .as_ref()
}

/// Some backends wrap structured output in a Markdown code fence even in
/// strict mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

pub fn decode_evaluation(payload: &str) -> Result<Evaluation, DecodeError> {
    let text = strip_code_fence(payload);
    let value: Value = serde_json::from_str(text).map_err(|source| DecodeError::Syntax {
        source,
        payload: payload.to_string(),
    })?;

    // Accept the camelCase spelling some backends echo back by normalizing it
    // before schema validation.
    let value = match value {
        Value::Object(mut map) => {
            if !map.contains_key("is_acceptable") {
                if let Some(flag) = map.remove("isAcceptable") {
                    map.insert("is_acceptable".to_string(), flag);
                }
            }
            Value::Object(map)
        }
        other => other,
    };

    if let Some(validator) = schema_validator() {
        let problems: Vec<String> = validator
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect();
        if !problems.is_empty() {
            return Err(DecodeError::Shape {
                problems,
                payload: payload.to_string(),
            });
        }
    }

    serde_json::from_value(value).map_err(|err| DecodeError::Shape {
        problems: vec![err.to_string()],
        payload: payload.to_string(),
    })
}

pub struct Evaluator {
    client: Arc<dyn CompletionClient>,
    system_prompt: String,
}

impl Evaluator {
    pub fn new(client: Arc<dyn CompletionClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }

    pub async fn evaluate(
        &self,
        reply: &str,
        user_message: &str,
        history: &[Message],
    ) -> Result<Evaluation, EvaluationError> {
        let request = CompletionRequest::new(vec![
            Message::system(self.system_prompt.clone()),
            Message::user(build_evaluator_user_prompt(reply, user_message, history)),
        ])
        .with_schema(ResponseSchema {
            name: EVALUATION_SCHEMA_NAME.to_string(),
            schema: evaluation_schema(),
        });

        let payload = self.client.complete(request).await?;
        let evaluation = decode_evaluation(&payload)?;
        debug!(
            client = self.client.label(),
            acceptable = evaluation.is_acceptable,
            "evaluation decoded"
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::ScriptedClient;

    #[test]
    fn decodes_plain_payload() {
        let evaluation = decode_evaluation(r#"{"is_acceptable": true, "feedback": ""}"#).unwrap();
        assert_eq!(
            evaluation,
            Evaluation {
                is_acceptable: true,
                feedback: String::new()
            }
        );
    }

    #[test]
    fn decodes_fenced_and_camel_case_payloads() {
        let fenced = "```json\n{\"is_acceptable\": false, \"feedback\": \"Too vague.\"}\n```";
        let evaluation = decode_evaluation(fenced).unwrap();
        assert!(!evaluation.is_acceptable);
        assert_eq!(evaluation.feedback, "Too vague.");

        let camel = decode_evaluation(r#"{"isAcceptable": true, "feedback": "fine"}"#).unwrap();
        assert!(camel.is_acceptable);
    }

    #[test]
    fn rejects_non_json() {
        let err = decode_evaluation("Looks good to me!").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn rejects_wrong_shapes() {
        for payload in [
            r#"{"feedback": "missing flag"}"#,
            r#"{"is_acceptable": "yes", "feedback": ""}"#,
            r#"{"is_acceptable": true}"#,
            r#"{"is_acceptable": true, "feedback": "", "score": 3}"#,
            r#"[true, "fine"]"#,
        ] {
            let err = decode_evaluation(payload).unwrap_err();
            assert!(
                matches!(err, DecodeError::Shape { .. }),
                "{payload} should be a shape error"
            );
        }
    }

    #[tokio::test]
    async fn evaluate_sends_strict_schema_with_both_prompts() {
        let client = Arc::new(ScriptedClient::new(
            "evaluator",
            [Ok(r#"{"is_acceptable": true, "feedback": "Good."}"#.to_string())],
        ));
        let evaluator = Evaluator::new(client.clone(), "judge carefully");
        let history = vec![Message::user("earlier"), Message::assistant("answer")];

        let evaluation = evaluator
            .evaluate("draft", "What's your experience?", &history)
            .await
            .unwrap();
        assert!(evaluation.is_acceptable);
        assert_eq!(evaluation.feedback, "Good.");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.system_prompt(), Some("judge carefully"));
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[1].content.contains("What's your experience?"));
        assert!(request.messages[1].content.contains("draft"));
        assert!(request.messages[1].content.contains("\"earlier\""));

        let format = request.response_format.as_ref().expect("schema attached");
        assert_eq!(format.name, "evaluation");
        assert_eq!(format.schema, evaluation_schema());
    }

    #[tokio::test]
    async fn evaluate_propagates_decode_failure() {
        let client = Arc::new(ScriptedClient::new(
            "evaluator",
            [Ok("definitely acceptable".to_string())],
        ));
        let evaluator = Evaluator::new(client.clone(), "judge");

        let err = evaluator.evaluate("draft", "q", &[]).await.unwrap_err();
        assert!(matches!(err, EvaluationError::Decode(_)));
        assert_eq!(client.requests().len(), 1, "decode failures are not retried");
    }

    #[tokio::test]
    async fn evaluate_propagates_request_failure() {
        let client = Arc::new(ScriptedClient::new(
            "evaluator",
            [Err(RequestError::Status {
                status: 429,
                body: "rate limited".to_string(),
            })],
        ));
        let evaluator = Evaluator::new(client, "judge");

        let err = evaluator.evaluate("draft", "q", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Request(RequestError::Status { status: 429, .. })
        ));
    }
}
