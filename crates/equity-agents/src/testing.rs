//! In-memory adapters shared by the unit tests

use async_trait::async_trait;
use equity_core::{CapabilityAdapter, CapabilityError, CapabilityRequest, DataDomain};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Data adapter returning a fixed payload, or failing when it has none
pub struct StaticAdapter {
    pub domain: DataDomain,
    pub payload: Option<Value>,
    pub calls: AtomicU32,
}

impl StaticAdapter {
    pub fn new(domain: DataDomain, payload: Value) -> Self {
        Self {
            domain,
            payload: Some(payload),
            calls: AtomicU32::new(0),
        }
    }

    pub fn down(domain: DataDomain) -> Self {
        Self {
            domain,
            payload: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityAdapter for StaticAdapter {
    fn name(&self) -> &str {
        "static"
    }

    fn domain(&self) -> DataDomain {
        self.domain
    }

    async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.payload {
            Some(payload) => Ok(json!({ "ticker": request.subject.identifier(), "data": payload })),
            None => Err(CapabilityError::unavailable(format!("{} is down", self.domain))),
        }
    }
}

/// Text generation adapter replaying canned completions in order
///
/// The last completion repeats once the script runs out. Every prompt is
/// recorded.
pub struct ScriptedText {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilityAdapter for ScriptedText {
    fn name(&self) -> &str {
        "scripted-llm"
    }

    fn domain(&self) -> DataDomain {
        DataDomain::TextGeneration
    }

    async fn call(&self, request: CapabilityRequest) -> Result<Value, CapabilityError> {
        let prompt = request.params["prompt"].as_str().unwrap_or_default().to_string();
        self.prompts.lock().unwrap().push(prompt);

        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        match last.clone() {
            Some(text) => Ok(json!({ "text": text })),
            None => Err(CapabilityError::unavailable("model offline")),
        }
    }
}

/// A well-formed specialist answer covering every expected section
pub fn analysis_json(agent: equity_core::AgentId) -> String {
    let details: String = agent
        .expected_sections()
        .iter()
        .map(|title| format!("## {title}\nSolid evidence for {title}.\n"))
        .collect();
    json!({
        "summary": format!("{} view", agent.persona()),
        "details": details,
        "metrics": [],
        "sources": [],
    })
    .to_string()
}

/// Provider answering by role: reviewer prompts get an approval, supervisor
/// prompts a report, specialist prompts a complete analysis for the persona
/// named in the system prompt
pub struct RoutingProvider {
    pub calls: AtomicU32,
}

impl RoutingProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl equity_llm::LLMProvider for RoutingProvider {
    async fn complete(
        &self,
        request: equity_llm::CompletionRequest,
    ) -> equity_llm::Result<equity_llm::CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = request.system.unwrap_or_default();

        let text = if system.contains("review desk") {
            r#"{"approved": true, "comments": [], "recommendations": []}"#.to_string()
        } else if system.contains("head of research") {
            "# Final report\nHold.".to_string()
        } else {
            let agent = equity_core::AgentId::ALL
                .into_iter()
                .find(|agent| system.starts_with(&format!("You are {}", agent.persona())))
                .unwrap_or(equity_core::AgentId::Fundamentalist);
            analysis_json(agent)
        };

        Ok(equity_llm::CompletionResponse {
            text,
            stop_reason: equity_llm::StopReason::EndTurn,
            usage: equity_llm::TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "routing"
    }
}
