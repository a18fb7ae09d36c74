//! Natural-language command derivation
//!
//! Lets a caller ask a question in plain English and have a language model
//! rewrite it as a `/cvemap` command line. The model is prompted with the
//! flag reference and asked to answer with a fenced JSON block carrying the
//! derived command; any explanatory text ahead of the block becomes the
//! stream preamble. Extraction is forgiving: a bare `/cvemap` line in an
//! unfenced response still counts.

use crate::command::{COMMAND_PREFIX, FLAG_REFERENCE};
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One turn of a model conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Speaker role, `system` or `user`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Build a system-role message
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Build a user-role message
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Boundary to the chat model used for derivation.
#[async_trait]
pub trait CommandModel: Send + Sync {
    /// Complete one conversation, returning the model's raw text reply.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Command line recovered from a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedCommand {
    /// The rewritten command line
    pub command: String,
    /// Explanatory text the model produced ahead of the command, if any
    pub preamble: Option<String>,
}

/// Extracts the derived command from a model reply.
///
/// Holds the compiled fence pattern so repeated extraction is cheap.
#[derive(Debug)]
pub struct CommandExtractor {
    fence: Regex,
}

impl CommandExtractor {
    /// Create a new extractor with the compiled fence pattern
    pub fn new() -> Self {
        Self {
            fence: Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence pattern is valid"),
        }
    }

    /// Pull the command line out of one model reply.
    ///
    /// Preferred form is a fenced JSON object with a `command` key; the text
    /// ahead of the fence, if non-empty, becomes the preamble. A reply with
    /// no usable fence falls back to the first line that starts with the
    /// command prefix.
    pub fn extract(&self, reply: &str) -> Result<DerivedCommand> {
        if let Some(captures) = self.fence.captures(reply) {
            let block = &captures[1];
            match serde_json::from_str::<FencedCommand>(block) {
                Ok(parsed) if !parsed.command.trim().is_empty() => {
                    let fence_start = captures
                        .get(0)
                        .map(|m| m.start())
                        .unwrap_or(0);
                    let preamble = reply[..fence_start].trim();
                    return Ok(DerivedCommand {
                        command: parsed.command.trim().to_string(),
                        preamble: if preamble.is_empty() {
                            None
                        } else {
                            Some(format!("{}\n\n", preamble))
                        },
                    });
                }
                Ok(_) => warn!("fenced block carried an empty command"),
                Err(e) => warn!("fenced block is not a command object: {}", e),
            }
        }

        // Unfenced fallback: the model sometimes answers with the bare line.
        for line in reply.lines() {
            let line = line.trim();
            if line.starts_with(COMMAND_PREFIX) {
                debug!("recovered unfenced command line");
                return Ok(DerivedCommand {
                    command: line.to_string(),
                    preamble: None,
                });
            }
        }

        Err(Error::NoJsonCommand)
    }
}

impl Default for CommandExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct FencedCommand {
    command: String,
}

/// Build the derivation conversation for one plain-English question.
pub fn derivation_messages(question: &str) -> Vec<ChatMessage> {
    let system = format!(
        "You rewrite vulnerability questions as cvemap command lines.\n\
         Reply with a short explanation followed by a fenced JSON block of the \
         form ```json\n{{\"command\": \"/cvemap ...\"}}\n``` using only the \
         flags documented below.\n\n{}",
        FLAG_REFERENCE
    );
    vec![ChatMessage::system(system), ChatMessage::user(question)]
}

/// Outcome of one derivation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// A command line was recovered from the reply
    Command(DerivedCommand),
    /// No usable command; the raw model text is the user-visible response
    Passthrough(String),
}

/// Ask the model to rewrite `question` and extract the resulting command.
///
/// A reply with no recoverable command is not an error: the raw model text
/// passes through as the final response.
pub async fn derive_command(model: &dyn CommandModel, question: &str) -> Result<Derivation> {
    let reply = model.complete(&derivation_messages(question)).await?;
    match CommandExtractor::new().extract(&reply) {
        Ok(derived) => Ok(Derivation::Command(derived)),
        Err(Error::NoJsonCommand) => {
            warn!("no command block in model reply, passing text through");
            Ok(Derivation::Passthrough(reply))
        }
        Err(e) => Err(e),
    }
}

/// Chat-completions backed command model.
#[derive(Debug, Clone)]
pub struct OpenAiCommandModel {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiCommandModel {
    /// Create a new model handle.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(Error::HttpRequest)?;

        Ok(Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key,
            model,
            client,
        })
    }

    /// Get the current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    fn is_api_key_valid(&self) -> bool {
        !self.api_key.is_empty() && !self.api_key.starts_with("${")
    }
}

#[async_trait]
impl CommandModel for OpenAiCommandModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        info!("deriving command with model: {}", self.model);

        if !self.is_api_key_valid() {
            return Err(Error::Model("API key not configured".to_string()));
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            content: String,
        }

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            warn!("model rate limit hit");
            return Err(Error::Model(
                "Rate limit exceeded, wait a moment and try again".to_string(),
            ));
        }

        if status.as_u16() == 401 {
            return Err(Error::Model("Authentication failed, check the API key".to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Model(format!("API error {}: {}", status, error_text)));
        }

        let response_data: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Model(format!("Failed to parse model response: {}", e)))?;

        let content = response_data
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Model("Model returned no choices".to_string()))?;

        debug!("model reply: {} chars", content.len());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_fenced_command_with_preamble() {
        let reply = "I'll look for critical RCEs with public exploits.\n\n\
                     ```json\n{\"command\": \"/cvemap -severity critical -poc\"}\n```";
        let derived = CommandExtractor::new().extract(reply).expect("extract");
        assert_eq!(derived.command, "/cvemap -severity critical -poc");
        assert_eq!(
            derived.preamble.as_deref(),
            Some("I'll look for critical RCEs with public exploits.\n\n")
        );
    }

    #[test]
    fn test_extract_fenced_command_without_preamble() {
        let reply = "```json\n{\"command\": \"/cvemap -kev\"}\n```";
        let derived = CommandExtractor::new().extract(reply).expect("extract");
        assert_eq!(derived.command, "/cvemap -kev");
        assert!(derived.preamble.is_none());
    }

    #[test]
    fn test_extract_untagged_fence() {
        let reply = "```\n{\"command\": \"/cvemap -vendor apache\"}\n```";
        let derived = CommandExtractor::new().extract(reply).expect("extract");
        assert_eq!(derived.command, "/cvemap -vendor apache");
    }

    #[test]
    fn test_unfenced_fallback() {
        let reply = "Here you go:\n/cvemap -severity high -limit 5\nHope that helps.";
        let derived = CommandExtractor::new().extract(reply).expect("extract");
        assert_eq!(derived.command, "/cvemap -severity high -limit 5");
        assert!(derived.preamble.is_none());
    }

    #[test]
    fn test_no_command_anywhere() {
        let reply = "I'm not sure how to answer that.";
        let err = CommandExtractor::new().extract(reply).unwrap_err();
        assert!(matches!(err, Error::NoJsonCommand));
    }

    #[test]
    fn test_empty_fenced_command_falls_through() {
        let reply = "```json\n{\"command\": \"  \"}\n```\n/cvemap -poc";
        let derived = CommandExtractor::new().extract(reply).expect("extract");
        assert_eq!(derived.command, "/cvemap -poc");
    }

    #[test]
    fn test_derivation_messages_carry_flag_reference() {
        let messages = derivation_messages("what log4j bugs are exploited?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("-severity"));
        assert_eq!(messages[1].content, "what log4j bugs are exploited?");
    }

    struct CannedModel {
        reply: String,
    }

    #[async_trait]
    impl CommandModel for CannedModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_derive_command_passes_raw_text_through() {
        let model = CannedModel {
            reply: "I can't map that to a query, sorry.".to_string(),
        };
        let derivation = derive_command(&model, "what's for lunch?")
            .await
            .expect("derive");
        assert_eq!(
            derivation,
            Derivation::Passthrough("I can't map that to a query, sorry.".to_string())
        );
    }

    #[tokio::test]
    async fn test_derive_command_recovers_fenced_command() {
        let model = CannedModel {
            reply: "```json\n{\"command\": \"/cvemap -kev -limit 5\"}\n```".to_string(),
        };
        let derivation = derive_command(&model, "recent kev entries")
            .await
            .expect("derive");
        match derivation {
            Derivation::Command(derived) => {
                assert_eq!(derived.command, "/cvemap -kev -limit 5")
            }
            other => panic!("unexpected derivation: {:?}", other),
        }
    }

    #[test]
    fn test_model_rejects_missing_api_key() {
        let model =
            OpenAiCommandModel::new(String::new(), "gpt-4".to_string()).expect("build model");
        assert!(!model.is_api_key_valid());
    }
}
