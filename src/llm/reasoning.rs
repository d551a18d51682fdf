//! Reasoning over perceptions: the agent's `Model` collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LlmError;
use crate::llm::parser::{extract_json, split_thinking_and_answer};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

const FIELDS: [&str; 4] = ["thoughts", "decisions", "questions", "learnings"];

/// Structured output of one think step. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkingResult {
    pub thoughts: String,
    pub decisions: Vec<String>,
    pub questions: Vec<String>,
    pub learnings: Vec<String>,
}

impl ThinkingResult {
    /// Fallback when the reply carries no usable structure.
    pub fn degraded(raw: impl Into<String>) -> Self {
        Self {
            thoughts: raw.into(),
            ..Self::default()
        }
    }

    /// Parse a model reply, degrading to `{thoughts: raw}` when no JSON
    /// object of the expected shape can be found.
    ///
    /// An object counts only if it carries at least one of the known fields.
    pub fn from_reply(raw: &str) -> Self {
        let answer = split_thinking_and_answer(raw).answer;
        extract_json(&answer)
            .and_then(|json| serde_json::from_str::<Map<String, Value>>(json).ok())
            .filter(|object| FIELDS.iter().any(|field| object.contains_key(*field)))
            .and_then(|object| serde_json::from_value::<ThinkingResult>(Value::Object(object)).ok())
            .unwrap_or_else(|| Self::degraded(raw))
    }
}

/// The model the agent loop thinks with.
#[async_trait]
pub trait Model: Send + Sync {
    /// Reason about a perception summary.
    async fn think(&self, context: &str) -> Result<ThinkingResult, LlmError>;

    /// Produce open-ended exploration questions about a topic.
    async fn generate_questions(&self, topic: &str, count: usize)
    -> Result<Vec<String>, LlmError>;
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an autonomous assistant that runs periodically in the background.
Each time you are called you receive a summary of your current state.

Respond with a single JSON object and nothing else:
{
  "thoughts": "a short reflection on the current state",
  "decisions": ["concrete actions to take now"],
  "questions": ["things you want to learn more about"],
  "learnings": ["facts or insights worth remembering"]
}

Any field may be an empty list. Actions that modify, delete, send or execute
anything will be held for human approval."#;

/// `Model` implementation backed by a chat completion provider.
pub struct Reasoning {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    temperature: Option<f32>,
}

impl Reasoning {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: None,
        }
    }

    /// Replace the default system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.is_empty() {
            self.system_prompt = prompt;
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    async fn ask(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let mut request = CompletionRequest::new(messages);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        let response = self.llm.complete(request).await?;
        tracing::debug!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Model replied"
        );
        Ok(response.content)
    }
}

#[async_trait]
impl Model for Reasoning {
    async fn think(&self, context: &str) -> Result<ThinkingResult, LlmError> {
        let reply = self
            .ask(vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(context),
            ])
            .await?;

        let result = ThinkingResult::from_reply(&reply);
        if result.decisions.is_empty() && result.questions.is_empty() && result.thoughts == reply {
            tracing::debug!("Model reply had no structure, using it as thoughts");
        }
        Ok(result)
    }

    async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
    ) -> Result<Vec<String>, LlmError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let prompt = format!(
            "Suggest {count} open-ended questions worth exploring about: {topic}\n\
             Reply with a JSON array of strings only."
        );
        let reply = self
            .ask(vec![
                ChatMessage::system("You generate concise, curious research questions."),
                ChatMessage::user(prompt),
            ])
            .await?;

        Ok(parse_questions(&reply, count))
    }
}

/// Parse a JSON array of strings, falling back to one question per line.
fn parse_questions(reply: &str, count: usize) -> Vec<String> {
    let answer = split_thinking_and_answer(reply).answer;

    let from_json = answer
        .find('[')
        .zip(answer.rfind(']'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<Vec<String>>(&answer[start..=end]).ok());

    let questions: Vec<String> = match from_json {
        Some(list) => list,
        None => answer
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(|c: char| {
                        c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*')
                    })
                    .trim()
                    .to_string()
            })
            .collect(),
    };

    questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;
    use tokio::sync::Mutex;

    use super::*;
    use crate::llm::{CompletionResponse, FinishReason};

    /// Replies with canned responses in order and records the prompts.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().await.push(req);
            let content = self
                .replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))?;
            Ok(CompletionResponse {
                content,
                finish_reason: FinishReason::Stop,
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_think_parses_structured_reply() {
        let provider = ScriptedProvider::new(vec![Ok(r#"Sure!
```json
{"thoughts": "all quiet", "decisions": ["review inbox"], "learnings": ["rust is fun"]}
```"#
            .to_string())]);
        let reasoning = Reasoning::new(provider.clone());

        let result = reasoning.think("cycle 1").await.unwrap();

        assert_eq!(
            result,
            ThinkingResult {
                thoughts: "all quiet".to_string(),
                decisions: vec!["review inbox".to_string()],
                questions: Vec::new(),
                learnings: vec!["rust is fun".to_string()],
            }
        );
        let seen = provider.seen.lock().await;
        assert_eq!(seen[0].messages[1].content, "cycle 1");
    }

    #[tokio::test]
    async fn test_think_degrades_on_unstructured_reply() {
        let raw = "I could not decide anything this time.";
        let reasoning = Reasoning::new(ScriptedProvider::new(vec![Ok(raw.to_string())]));

        let result = reasoning.think("cycle 2").await.unwrap();

        assert_eq!(result, ThinkingResult::degraded(raw));
        assert!(result.decisions.is_empty());
        assert!(result.questions.is_empty());
        assert!(result.learnings.is_empty());
    }

    #[test]
    fn test_reply_without_expected_fields_degrades() {
        let raw = r#"{"status":"ok","note":"nothing planned"}"#;
        assert_eq!(ThinkingResult::from_reply(raw), ThinkingResult::degraded(raw));

        let wrong_type = r#"{"decisions": "not a list"}"#;
        assert_eq!(
            ThinkingResult::from_reply(wrong_type),
            ThinkingResult::degraded(wrong_type)
        );

        assert_eq!(
            ThinkingResult::from_reply(r#"{"questions": ["why?"], "extra": 1}"#),
            ThinkingResult {
                questions: vec!["why?".to_string()],
                ..ThinkingResult::default()
            }
        );
    }

    #[tokio::test]
    async fn test_think_ignores_reasoning_tags() {
        let reply = r#"<think>maybe {"thoughts": "wrong"}</think>{"thoughts": "right"}"#;
        let reasoning = Reasoning::new(ScriptedProvider::new(vec![Ok(reply.to_string())]));

        let result = reasoning.think("ctx").await.unwrap();
        assert_eq!(result.thoughts, "right");
    }

    #[tokio::test]
    async fn test_think_propagates_provider_failure() {
        let reasoning = Reasoning::new(ScriptedProvider::new(vec![Err(LlmError::RequestFailed {
            provider: "scripted".to_string(),
            reason: "connection refused".to_string(),
        })]));

        assert!(reasoning.think("ctx").await.is_err());
    }

    #[tokio::test]
    async fn test_generate_questions() {
        let reasoning = Reasoning::new(ScriptedProvider::new(vec![
            Ok(r#"["Why is the sky blue?", "How do tides work?", "What is entropy?"]"#.to_string()),
            Ok("1. What is a monad?\n2) Why Rust?\n\n- Who wrote Dune?".to_string()),
        ]));

        let first = reasoning.generate_questions("nature", 2).await.unwrap();
        assert_eq!(first, vec!["Why is the sky blue?", "How do tides work?"]);

        let second = reasoning.generate_questions("anything", 5).await.unwrap();
        assert_eq!(
            second,
            vec!["What is a monad?", "Why Rust?", "Who wrote Dune?"]
        );

        assert!(reasoning.generate_questions("none", 0).await.unwrap().is_empty());
    }
}
