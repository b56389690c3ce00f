use crate::error::ModelCallError;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionNamedToolChoice, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionToolArgs, ChatCompletionToolChoiceOption, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionName,
        FunctionObjectArgs,
    },
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Sampling temperature used for every interview and analysis call.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion budget for a single reply.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// A function the model is forced to call, used to constrain the reply to a
/// JSON schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One completion request: a system prompt and a single user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub function: Option<ReplyFunction>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            function: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }

    pub fn with_function(mut self, function: ReplyFunction) -> Self {
        self.function = Some(function);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Makes a single, non-streaming completion call and returns the raw text
    /// payload: the forced function call's arguments if the model made one,
    /// otherwise the message content.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelCallError>;
}

/// An implementation of `LlmClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAICompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelCallError> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_message)
                .build()?
                .into(),
        ];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .temperature(request.temperature);
        if let Some(max_tokens) = request.max_tokens {
            args.max_completion_tokens(max_tokens);
        }

        if let Some(function) = request.function {
            let tool = ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(
                    FunctionObjectArgs::default()
                        .name(function.name.clone())
                        .description(function.description)
                        .parameters(function.parameters)
                        .build()?,
                )
                .build()?;
            args.tools(vec![tool])
                .tool_choice(ChatCompletionToolChoiceOption::Named(
                    ChatCompletionNamedToolChoice {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionName {
                            name: function.name,
                        },
                    },
                ));
        }

        let response: CreateChatCompletionResponse =
            self.client.chat().create(args.build()?).await?;
        payload(response)
    }
}

/// The raw text of a completion: the first choice's function-call arguments
/// when they are non-blank, otherwise its message content.
pub fn payload(response: CreateChatCompletionResponse) -> Result<String, ModelCallError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ModelCallError::EmptyResponse)?;

    if let Some(call) = choice
        .message
        .tool_calls
        .and_then(|calls| calls.into_iter().next())
    {
        if !call.function.arguments.trim().is_empty() {
            debug!(function = %call.function.name, "Model answered with a function call");
            return Ok(call.function.arguments);
        }
    }

    choice
        .message
        .content
        .filter(|content| !content.trim().is_empty())
        .ok_or(ModelCallError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_request_defaults() {
        let request = CompletionRequest::new("system", "user");
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(request.max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert!(request.function.is_none());

        let request = request
            .with_function(ReplyFunction {
                name: "f".to_string(),
                description: "d".to_string(),
                parameters: json!({"type": "object"}),
            })
            .with_max_tokens(None);
        assert_eq!(request.function.unwrap().name, "f");
        assert_eq!(request.max_tokens, None);
    }

    fn response(message: Value) -> CreateChatCompletionResponse {
        let choices = if message.is_null() {
            json!([])
        } else {
            json!([{"index": 0, "message": message, "finish_reason": "stop"}])
        };
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-3.5-turbo-0125",
            "choices": choices,
        }))
        .unwrap()
    }

    fn tool_call(arguments: &str) -> Value {
        json!([{
            "id": "call_1",
            "type": "function",
            "function": {"name": "provide_interview_response", "arguments": arguments}
        }])
    }

    #[test]
    fn test_payload_prefers_function_arguments() {
        let raw = payload(response(json!({
            "role": "assistant",
            "content": "plain text",
            "tool_calls": tool_call(r#"{"action":"FOLLOW_UP","message":"Go on."}"#),
        })))
        .unwrap();
        assert_eq!(raw, r#"{"action":"FOLLOW_UP","message":"Go on."}"#);
    }

    #[test]
    fn test_payload_falls_back_to_content_on_blank_arguments() {
        let raw = payload(response(json!({
            "role": "assistant",
            "content": "{\"message\":\"From content\"}",
            "tool_calls": tool_call("  "),
        })))
        .unwrap();
        assert_eq!(raw, r#"{"message":"From content"}"#);
    }

    #[test]
    fn test_payload_empty_responses() {
        assert!(matches!(
            payload(response(Value::Null)),
            Err(ModelCallError::EmptyResponse)
        ));
        assert!(matches!(
            payload(response(json!({"role": "assistant", "content": "   "}))),
            Err(ModelCallError::EmptyResponse)
        ));
        assert!(matches!(
            payload(response(json!({"role": "assistant", "content": null}))),
            Err(ModelCallError::EmptyResponse)
        ));
    }
}
