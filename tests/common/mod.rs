//! In-memory collaborators for driving the orchestrator without a server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use omnitech_agent::agent::{
    AgentConfig, ChatRequest, ChatResponse, LlmProvider, Orchestrator, PromptSet, TokenUsage,
    ToolDescriptor, ToolEnvelope, ToolTransport,
};
use omnitech_agent::error::AgentError;
use serde_json::{Map, Value, json};

/// Answers tool calls from a fixed table and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, ToolEnvelope>,
    calls: Mutex<Vec<(String, Value)>>,
    closed: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, tool: &str, payload: Value) -> Self {
        self.replies
            .insert(tool.to_string(), ToolEnvelope::json(&payload));
        self
    }

    pub fn reply_envelope(mut self, tool: &str, envelope: ToolEnvelope) -> Self {
        self.replies.insert(tool.to_string(), envelope);
        self
    }

    /// Tool names called so far, in order.
    pub fn called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Arguments of the first call to `tool`.
    pub fn arguments_of(&self, tool: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .iter()
            .find(|(name, _)| name == tool)
            .map(|(_, args)| args.clone())
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        let mut names: Vec<_> = self.replies.keys().cloned().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ToolDescriptor {
                name,
                description: None,
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolEnvelope, AgentError> {
        self.calls
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .push((name.to_string(), Value::Object(arguments)));
        self.replies
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::ToolCall {
                name: name.to_string(),
                message: "connection reset by peer".to_string(),
            })
    }

    async fn close(&self) -> Result<(), AgentError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Returns the same completion for every prompt and remembers prompts.
pub struct ScriptedProvider {
    reply: String,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .last()
            .cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|_| unreachable!())
            .push(request.prompt.clone());
        Ok(ChatResponse {
            content: self.reply.clone(),
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// A knowledge server that knows about account security and company info.
pub fn support_server() -> ScriptedTransport {
    ScriptedTransport::new()
        .reply(
            "classify_query",
            json!({"category": "account_security", "confidence": 0.92}),
        )
        .reply(
            "get_query_template",
            json!({
                "template": "Security question: {query}\nDocs: {knowledge}",
                "description": "Account Security"
            }),
        )
        .reply(
            "get_knowledge_for_query",
            json!({
                "knowledge": "Open Settings > Security and choose Reset Password.",
                "sources": ["security_guide.pdf", "security_guide.pdf", "faq.pdf"]
            }),
        )
        .reply(
            "search_knowledge",
            json!({"matches": [
                {"content": "OmniTech was founded in 2010.", "source": "about.pdf"},
                {"content": "We make laptops and phones.", "source": "catalog.pdf"},
                {"content": "Headquartered in Austin.", "source": "about.pdf"},
                {"content": "Support hours are 9-5.", "source": "support.pdf"}
            ]}),
        )
}

pub const FENCED_REPLY: &str = "Sure! Here is the answer:\n```json\n{\"response\": \"Reset it from Settings > Security.\", \"action_needed\": \"none\", \"confidence\": 0.9}\n```";

pub fn orchestrator(
    transport: &Arc<ScriptedTransport>,
    provider: Option<&Arc<ScriptedProvider>>,
) -> Orchestrator {
    Orchestrator::new(
        Arc::clone(transport) as Arc<dyn ToolTransport>,
        provider.map(|p| Arc::clone(p) as Arc<dyn LlmProvider>),
        AgentConfig::default(),
    )
    .with_prompts(PromptSet::defaults())
}
