//! Execution gateway
//!
//! The seam between the core and the model-calling client. The gateway
//! re-validates lane permission before dispatch, owns usage accounting,
//! and performs no retry on provider failure: the error surfaces to the
//! caller, which marks the enclosing unit of work as failed.

mod http;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use http::HttpModelClient;

use crate::agents::AgentRegistry;
use crate::error::CoreError;
use crate::storage::{UsageRecord, UsageSink};

/// Billed price is provider cost with this markup applied.
const PRICE_MARKUP: f64 = 1.25;

/// Per-million-token provider rates (input, output), matched by substring
/// against the model name.
const MODEL_RATES: [(&str, f64, f64); 3] = [
    ("deep", 3.0, 15.0),
    ("balanced", 1.0, 5.0),
    ("fast", 0.25, 1.25),
];
const DEFAULT_RATES: (f64, f64) = (1.0, 5.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Role-tagged message for provider communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Raw reply from the model client.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub provider: String,
}

/// Incremental output from a streamed completion. The stream terminates
/// with a `Usage` part; dropping the receiver cancels consumption and
/// discards remaining tokens.
#[derive(Debug, Clone)]
pub enum StreamPart {
    TextDelta {
        delta: String,
    },
    /// Terminal part; carries the model/provider that served the call so
    /// usage accounting matches the atomic path.
    Usage {
        usage: TokenUsage,
        model: String,
        provider: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub max_tokens: Option<usize>,
    pub model_override: Option<String>,
    /// Routing hint from the agent definition; clients may use it to pick
    /// among their configured models.
    pub model_hint: Option<String>,
}

/// Opaque "send messages, get completion" capability.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ModelMessage],
        options: &CallOptions,
    ) -> Result<ModelReply>;

    /// Streaming variant: text deltas terminated by a usage report.
    async fn stream(
        &self,
        system_prompt: &str,
        messages: &[ModelMessage],
        options: &CallOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>>;
}

/// Outcome of one gateway execution.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Provider cost in dollars.
    pub cost: f64,
    /// Billed price in dollars.
    pub price: f64,
    pub model: String,
    pub provider: String,
}

pub struct ExecutionGateway {
    client: Arc<dyn ModelClient>,
    registry: Arc<AgentRegistry>,
    usage_sink: Arc<dyn UsageSink>,
}

impl ExecutionGateway {
    /// The client and sink are injected once at process startup; there is
    /// no lazy construct-if-absent path.
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<AgentRegistry>,
        usage_sink: Arc<dyn UsageSink>,
    ) -> Self {
        Self {
            client,
            registry,
            usage_sink,
        }
    }

    /// Execute an atomic completion for the named agent.
    ///
    /// Lane permission is checked here even when callers already
    /// validated it; every model call passes through this gate.
    pub async fn execute(
        &self,
        agent_name: &str,
        lane: Option<i64>,
        system_prompt: &str,
        messages: &[ModelMessage],
        options: &CallOptions,
    ) -> Result<Execution> {
        self.check_permission(agent_name, lane)?;

        let reply = self
            .client
            .complete(system_prompt, messages, options)
            .await
            .map_err(|e| CoreError::Provider(e.to_string()))?;

        if reply.content.trim().is_empty() {
            return Err(CoreError::Provider("model returned no usable content".into()).into());
        }

        let (cost, price) = compute_cost(&reply.model, reply.usage);
        self.record_usage(agent_name, &reply.model, &reply.provider, reply.usage, cost, price);

        Ok(Execution {
            content: reply.content,
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
            cost,
            price,
            model: reply.model,
            provider: reply.provider,
        })
    }

    /// Streaming variant. Usage is recorded when the terminating usage
    /// part arrives; a caller that cancels mid-stream forfeits the usage
    /// record for that call.
    pub async fn execute_streaming(
        &self,
        agent_name: &str,
        lane: Option<i64>,
        system_prompt: &str,
        messages: &[ModelMessage],
        options: &CallOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        self.check_permission(agent_name, lane)?;

        let mut inner = self
            .client
            .stream(system_prompt, messages, options)
            .await
            .map_err(|e| CoreError::Provider(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = self.usage_sink.clone();
        let agent = agent_name.to_string();

        tokio::spawn(async move {
            while let Some(part) = inner.recv().await {
                if let StreamPart::Usage {
                    usage,
                    model,
                    provider,
                } = &part
                {
                    let (cost, price) = compute_cost(model, *usage);
                    let record = UsageRecord {
                        agent: agent.clone(),
                        model: model.clone(),
                        provider: provider.clone(),
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        cost,
                        price,
                    };
                    if let Err(e) = sink.record(&record) {
                        tracing::error!("failed to record streamed usage: {e}");
                    }
                }
                if tx.send(part).is_err() {
                    // Receiver dropped: caller cancelled, stop reading.
                    break;
                }
            }
        });

        Ok(rx)
    }

    fn check_permission(&self, agent_name: &str, lane: Option<i64>) -> Result<()> {
        if self.registry.get(agent_name).is_none() {
            return Err(CoreError::UnknownAgent(agent_name.to_string()).into());
        }
        if let Some(lane) = lane {
            if !self.registry.is_allowed_in_lane(agent_name, lane) {
                return Err(CoreError::AgentNotAllowedInLane {
                    agent: agent_name.to_string(),
                    lane,
                }
                .into());
            }
        }
        Ok(())
    }

    fn record_usage(
        &self,
        agent: &str,
        model: &str,
        provider: &str,
        usage: TokenUsage,
        cost: f64,
        price: f64,
    ) {
        let record = UsageRecord {
            agent: agent.to_string(),
            model: model.to_string(),
            provider: provider.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost,
            price,
        };
        if let Err(e) = self.usage_sink.record(&record) {
            tracing::error!("failed to record usage: {e}");
        }
    }
}

/// Provider cost and billed price for a completed call.
fn compute_cost(model: &str, usage: TokenUsage) -> (f64, f64) {
    let (input_rate, output_rate) = MODEL_RATES
        .iter()
        .find(|(needle, _, _)| model.contains(needle))
        .map(|(_, i, o)| (*i, *o))
        .unwrap_or(DEFAULT_RATES);

    let cost = (usage.input_tokens as f64 * input_rate
        + usage.output_tokens as f64 * output_rate)
        / 1_000_000.0;
    (cost, cost * PRICE_MARKUP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubClient {
        reply: String,
    }

    #[async_trait]
    impl ModelClient for StubClient {
        async fn complete(
            &self,
            _system_prompt: &str,
            _messages: &[ModelMessage],
            _options: &CallOptions,
        ) -> Result<ModelReply> {
            Ok(ModelReply {
                content: self.reply.clone(),
                usage: TokenUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
                model: "stub-balanced".into(),
                provider: "stub".into(),
            })
        }

        async fn stream(
            &self,
            _system_prompt: &str,
            _messages: &[ModelMessage],
            _options: &CallOptions,
        ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(StreamPart::TextDelta {
                delta: self.reply.clone(),
            })
            .ok();
            tx.send(StreamPart::Usage {
                usage: TokenUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
                model: "stub-balanced".into(),
                provider: "stub".into(),
            })
            .ok();
            Ok(rx)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<UsageRecord>>,
    }

    impl UsageSink for RecordingSink {
        fn record(&self, record: &UsageRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn gateway(reply: &str) -> (ExecutionGateway, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let gateway = ExecutionGateway::new(
            Arc::new(StubClient {
                reply: reply.into(),
            }),
            Arc::new(AgentRegistry::builtin()),
            sink.clone(),
        );
        (gateway, sink)
    }

    #[tokio::test]
    async fn test_execute_records_usage() {
        let (gateway, sink) = gateway("hello");
        let execution = gateway
            .execute("orchestrator", None, "sys", &[], &CallOptions::default())
            .await
            .unwrap();

        assert_eq!(execution.content, "hello");
        assert_eq!(execution.input_tokens, 100);
        assert!(execution.cost > 0.0);
        assert!(execution.price > execution.cost);

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].agent, "orchestrator");
    }

    #[tokio::test]
    async fn test_lane_permission_rechecked() {
        let (gateway, sink) = gateway("hello");
        let err = gateway
            .execute("frontend-agent", Some(1), "sys", &[], &CallOptions::default())
            .await
            .unwrap_err();

        let core = err.downcast_ref::<CoreError>().unwrap();
        assert!(matches!(core, CoreError::AgentNotAllowedInLane { lane: 1, .. }));
        assert!(sink.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_is_provider_error() {
        let (gateway, _) = gateway("   ");
        let err = gateway
            .execute("orchestrator", None, "sys", &[], &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_streaming_forwards_parts_and_records_usage() {
        let (gateway, sink) = gateway("chunk");
        let mut rx = gateway
            .execute_streaming("orchestrator", Some(0), "sys", &[], &CallOptions::default())
            .await
            .unwrap();

        let mut text = String::new();
        let mut saw_usage = false;
        while let Some(part) = rx.recv().await {
            match part {
                StreamPart::TextDelta { delta } => text.push_str(&delta),
                StreamPart::Usage { .. } => saw_usage = true,
                StreamPart::Error { .. } => panic!("unexpected error part"),
            }
        }

        assert_eq!(text, "chunk");
        assert!(saw_usage);
        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_streamed_usage_attributed_to_serving_model() {
        let (gateway, sink) = gateway("chunk");
        let mut rx = gateway
            .execute_streaming("orchestrator", None, "sys", &[], &CallOptions::default())
            .await
            .unwrap();
        while rx.recv().await.is_some() {}

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model, "stub-balanced");
        assert_eq!(records[0].provider, "stub");

        // Same rates as the atomic path: balanced at $1/$5 per Mtok
        let expected = (100.0 * 1.0 + 50.0 * 5.0) / 1_000_000.0;
        assert!((records[0].cost - expected).abs() < 1e-12);
        assert!((records[0].price - expected * PRICE_MARKUP).abs() < 1e-12);
    }
}
