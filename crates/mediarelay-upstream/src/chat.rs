use async_trait::async_trait;
use mediarelay_core::ChatReply;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    decode_error, ensure_success, request_error, ChatCompletion, ChatRequest, UpstreamError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are Tina, a friendly assistant for the Eliobros Tech media API. \
Answer concisely and in the language the user writes in.";

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(client: Client, base_url: &str, api_key: String, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_messages(request: &ChatRequest) -> Vec<Message<'_>> {
    let mut messages = vec![Message {
        role: "system",
        content: SYSTEM_PROMPT,
    }];
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        messages.push(Message {
            role: "assistant",
            content: context,
        });
    }
    messages.push(Message {
        role: "user",
        content: &request.message,
    });
    messages
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn reply(&self, request: &ChatRequest) -> Result<ChatReply, UpstreamError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: build_messages(request),
            user: request.user.as_deref(),
        };
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let resp = ensure_success(resp, &self.api_key).await?;
        let parsed: CompletionResponse = resp.json().await.map_err(decode_error)?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| UpstreamError::Decode("completion has no choices".into()))?;

        Ok(ChatReply {
            reply,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_without_context() {
        let req = ChatRequest {
            message: "hello".into(),
            ..Default::default()
        };
        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[1].content, "hello");
    }

    #[test]
    fn messages_with_context_precede_user_turn() {
        let req = ChatRequest {
            message: "and tomorrow?".into(),
            context: Some("It is sunny in Maputo today.".into()),
            user: None,
        };
        let msgs = build_messages(&req);
        let roles: Vec<_> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
    }

    #[test]
    fn blank_context_is_ignored() {
        let req = ChatRequest {
            message: "hi".into(),
            context: Some("   ".into()),
            user: None,
        };
        assert_eq!(build_messages(&req).len(), 2);
    }
}
