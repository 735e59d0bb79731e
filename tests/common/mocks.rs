//! Mock implementations for testing.
//!
//! Scripted LLM clients, agents and tools shared by the integration tests.
//! Every client created by one [`MockLLMFactory`] pops its answers from the
//! same [`Script`], so a test lays out a whole run in call order.

#![allow(dead_code)]

use atlas::agents::{Agent, AgentFactory, AgentKind, AgentOutput, AgentSetup};
use atlas::llm::{
    AgentRole, ContentStream, ConversationMessage, LLMClient, LLMClientFactoryTrait, LLMResponse,
    ModelKind,
};
use atlas::tools::Tool;
use atlas::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One scripted model answer
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer to `generate_with_tools`
    Tools {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    /// Answer to `generate_json`
    Json(Value),
    /// Answer to `stream_with_history`, one fragment per chunk
    Chunks(Vec<String>),
    /// Answer to `generate` and `generate_with_history`
    Text(String),
    /// Any call fails with an LLM error
    Fail,
}

/// Coordinator reply that hands the query to the planner
pub fn handoff(topic: &str) -> Reply {
    Reply::Tools {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: "call_1".to_string(),
            name: "handoff_to_planner".to_string(),
            arguments: json!({"research_topic": topic, "locale": "en-US"}),
        }],
    }
}

/// Coordinator reply that answers directly
pub fn direct_answer(text: &str) -> Reply {
    Reply::Tools {
        content: text.to_string(),
        tool_calls: vec![],
    }
}

/// A plan document; each step is `(title, step_type)`
pub fn plan_json(has_enough_context: bool, steps: &[(&str, &str)]) -> Value {
    let steps: Vec<Value> = steps
        .iter()
        .map(|(title, step_type)| {
            json!({
                "need_search": *step_type == "research",
                "title": title,
                "description": format!("Work on {}", title),
                "step_type": step_type,
            })
        })
        .collect();
    json!({
        "locale": "en-US",
        "has_enough_context": has_enough_context,
        "thought": "Break the question down",
        "title": "Research plan",
        "steps": steps,
    })
}

/// Shared queue of scripted replies plus a log of what each call saw
#[derive(Clone, Default)]
pub struct Script {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<Mutex<Vec<(String, Vec<ConversationMessage>)>>>,
}

impl Script {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            calls: Arc::default(),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }

    /// `(method, messages)` for every call so far
    pub fn calls(&self) -> Vec<(String, Vec<ConversationMessage>)> {
        self.calls.lock().clone()
    }

    fn next(&self, method: &str, messages: &[ConversationMessage]) -> Result<Reply> {
        self.calls
            .lock()
            .push((method.to_string(), messages.to_vec()));
        match self.replies.lock().pop_front() {
            Some(Reply::Fail) => Err(AppError::LLM("Mock LLM failure".to_string())),
            Some(reply) => Ok(reply),
            None => Err(AppError::LLM(format!("No scripted reply left for {}", method))),
        }
    }
}

fn unexpected(method: &str, reply: &Reply) -> AppError {
    AppError::LLM(format!("{} got unexpected scripted reply {:?}", method, reply))
}

/// Mock LLM client answering from a [`Script`]
pub struct MockLLMClient {
    script: Script,
    model: String,
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.script.next("generate", &[ConversationMessage::user(prompt)])? {
            Reply::Text(text) => Ok(text),
            other => Err(unexpected("generate", &other)),
        }
    }

    async fn generate_with_history(&self, messages: &[ConversationMessage]) -> Result<String> {
        match self.script.next("generate_with_history", messages)? {
            Reply::Text(text) => Ok(text),
            other => Err(unexpected("generate_with_history", &other)),
        }
    }

    async fn generate_with_tools(
        &self,
        messages: &[ConversationMessage],
        _tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        match self.script.next("generate_with_tools", messages)? {
            Reply::Tools {
                content,
                tool_calls,
            } => {
                let finish_reason = if tool_calls.is_empty() {
                    "stop"
                } else {
                    "tool_calls"
                };
                Ok(LLMResponse {
                    content,
                    tool_calls,
                    finish_reason: finish_reason.to_string(),
                    usage: None,
                })
            }
            other => Err(unexpected("generate_with_tools", &other)),
        }
    }

    async fn generate_json(&self, messages: &[ConversationMessage]) -> Result<Value> {
        match self.script.next("generate_json", messages)? {
            Reply::Json(value) => Ok(value),
            other => Err(unexpected("generate_json", &other)),
        }
    }

    async fn stream_with_history(&self, messages: &[ConversationMessage]) -> Result<ContentStream> {
        match self.script.next("stream_with_history", messages)? {
            Reply::Chunks(chunks) => Ok(Box::new(stream::iter(
                chunks.into_iter().map(Ok).collect::<Vec<Result<String>>>(),
            ))),
            other => Err(unexpected("stream_with_history", &other)),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock LLM factory; every role runs on the basic model unless overridden
#[derive(Clone, Default)]
pub struct MockLLMFactory {
    pub script: Script,
    kinds: HashMap<AgentRole, ModelKind>,
    created: Arc<Mutex<Vec<ModelKind>>>,
}

impl MockLLMFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, role: AgentRole, kind: ModelKind) -> Self {
        self.kinds.insert(role, kind);
        self
    }

    /// Model kinds requested so far, in order
    pub fn created_kinds(&self) -> Vec<ModelKind> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl LLMClientFactoryTrait for MockLLMFactory {
    fn model_kind(&self, role: AgentRole) -> ModelKind {
        self.kinds.get(&role).copied().unwrap_or(ModelKind::Basic)
    }

    async fn create_for_kind(&self, kind: ModelKind) -> Result<Box<dyn LLMClient>> {
        self.created.lock().push(kind);
        Ok(Box::new(MockLLMClient {
            script: self.script.clone(),
            model: format!("mock-{}", kind),
        }))
    }
}

/// Agent that answers every task with a fixed text
pub struct MockAgent {
    kind: AgentKind,
    answer: Option<String>,
    invocations: Arc<Mutex<Vec<Vec<ConversationMessage>>>>,
}

#[async_trait]
impl Agent for MockAgent {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn invoke(&self, messages: Vec<ConversationMessage>) -> Result<AgentOutput> {
        self.invocations.lock().push(messages.clone());
        let Some(answer) = &self.answer else {
            return Err(AppError::LLM("agent model unavailable".to_string()));
        };
        let mut history = messages;
        history.push(ConversationMessage::assistant(answer.as_str(), vec![]));
        Ok(AgentOutput::new(history))
    }
}

/// Agent factory handing out [`MockAgent`]s and recording their setup
#[derive(Clone, Default)]
pub struct MockAgentFactory {
    answers: HashMap<AgentKind, Option<String>>,
    invocations: Arc<Mutex<Vec<Vec<ConversationMessage>>>>,
    setups: Arc<Mutex<Vec<(AgentKind, Vec<String>)>>>,
}

impl MockAgentFactory {
    pub fn new() -> Self {
        Self::default()
            .answering(AgentKind::Researcher, "research findings")
            .answering(AgentKind::Coder, "computed result")
    }

    pub fn answering(mut self, kind: AgentKind, answer: &str) -> Self {
        self.answers.insert(kind, Some(answer.to_string()));
        self
    }

    pub fn failing(mut self, kind: AgentKind) -> Self {
        self.answers.insert(kind, None);
        self
    }

    /// Messages each agent invocation received
    pub fn invocations(&self) -> Vec<Vec<ConversationMessage>> {
        self.invocations.lock().clone()
    }

    /// Agent kind and extra tool names for every agent created
    pub fn setups(&self) -> Vec<(AgentKind, Vec<String>)> {
        self.setups.lock().clone()
    }
}

#[async_trait]
impl AgentFactory for MockAgentFactory {
    async fn create_agent(&self, kind: AgentKind, setup: AgentSetup) -> Result<Arc<dyn Agent>> {
        let tools = setup
            .extra_tools
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        self.setups.lock().push((kind, tools));
        Ok(Arc::new(MockAgent {
            kind,
            answer: self.answers.get(&kind).cloned().flatten(),
            invocations: Arc::clone(&self.invocations),
        }))
    }
}

/// Search tool returning canned results
pub struct MockSearchTool {
    pub results: Value,
    pub queries: Arc<Mutex<Vec<Value>>>,
}

impl MockSearchTool {
    pub fn new(results: Value) -> Self {
        Self {
            results,
            queries: Arc::default(),
        }
    }
}

#[async_trait]
impl Tool for MockSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Canned web search"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        self.queries.lock().push(args);
        Ok(self.results.clone())
    }
}
