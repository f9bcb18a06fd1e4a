//! Default HTTP model client
//!
//! Speaks an Anthropic-style messages API over reqwest. The core treats
//! the provider as opaque; this client exists so the gateway has a real
//! capability to wrap, and any `ModelClient` impl can replace it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{CallOptions, ModelClient, ModelMessage, ModelReply, Role, StreamPart, TokenUsage};

const DEFAULT_MAX_TOKENS: usize = 4096;

pub struct HttpModelClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    provider: String,
}

impl HttpModelClient {
    pub fn new(api_url: String, api_key: String, model: String, provider: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            model,
            provider,
        }
    }

    fn build_body(
        &self,
        system_prompt: &str,
        messages: &[ModelMessage],
        options: &CallOptions,
        stream: bool,
    ) -> Value {
        let model = options.model_override.as_deref().unwrap_or(&self.model);
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": m.content,
                })
            })
            .collect();

        json!({
            "model": model,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "system": system_prompt,
            "messages": messages,
            "stream": stream,
        })
    }

    fn request(&self) -> reqwest::RequestBuilder {
        self.http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
    }
}

fn collect_text(blocks: &[Value]) -> String {
    let mut text = String::new();
    for block in blocks {
        if block.get("type").and_then(|t| t.as_str()) != Some("text") {
            continue;
        }
        if let Some(chunk) = block.get("text").and_then(|t| t.as_str()) {
            text.push_str(chunk);
        }
    }
    text
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ModelMessage],
        options: &CallOptions,
    ) -> Result<ModelReply> {
        let body = self.build_body(system_prompt, messages, options, false);
        let response = self.request().json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("provider returned {status}: {detail}");
        }

        let json: Value = response.json().await.context("invalid provider response")?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| collect_text(blocks))
            .unwrap_or_default();

        let usage = TokenUsage {
            input_tokens: json
                .pointer("/usage/input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            output_tokens: json
                .pointer("/usage/output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        };

        let model = json
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(&self.model)
            .to_string();

        Ok(ModelReply {
            content,
            usage,
            model,
            provider: self.provider.clone(),
        })
    }

    async fn stream(
        &self,
        system_prompt: &str,
        messages: &[ModelMessage],
        options: &CallOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        let body = self.build_body(system_prompt, messages, options, true);
        let response = self.request().json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("provider returned {status}: {detail}");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let configured_model = options
            .model_override
            .clone()
            .unwrap_or_else(|| self.model.clone());
        let provider = self.provider.clone();

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            let mut usage = TokenUsage::default();
            let mut model = configured_model;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(StreamPart::Error {
                            message: format!("stream read failed: {e}"),
                        });
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE events are newline-delimited; keep the trailing
                // partial line in the buffer.
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let Ok(event) = serde_json::from_str::<Value>(data.trim()) else {
                        continue;
                    };

                    match event.get("type").and_then(|t| t.as_str()) {
                        Some("content_block_delta") => {
                            if let Some(delta) =
                                event.pointer("/delta/text").and_then(|t| t.as_str())
                            {
                                if tx
                                    .send(StreamPart::TextDelta {
                                        delta: delta.to_string(),
                                    })
                                    .is_err()
                                {
                                    // Caller cancelled; stop reading.
                                    return;
                                }
                            }
                        }
                        Some("message_start") => {
                            if let Some(input) = event
                                .pointer("/message/usage/input_tokens")
                                .and_then(|v| v.as_u64())
                            {
                                usage.input_tokens = input;
                            }
                            if let Some(served) =
                                event.pointer("/message/model").and_then(|m| m.as_str())
                            {
                                model = served.to_string();
                            }
                        }
                        Some("message_delta") => {
                            if let Some(output) = event
                                .pointer("/usage/output_tokens")
                                .and_then(|v| v.as_u64())
                            {
                                usage.output_tokens = output;
                            }
                        }
                        _ => {}
                    }
                }
            }

            let _ = tx.send(StreamPart::Usage {
                usage,
                model,
                provider,
            });
        });

        Ok(rx)
    }
}
