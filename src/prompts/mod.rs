//! Prompt templates for each model-facing role
//!
//! Templates are markdown files compiled into the binary. Placeholders use
//! `{{ NAME }}` syntax; `CURRENT_TIME` is always available.

use crate::llm::coordinator::ConversationMessage;
use std::collections::HashMap;

/// Built-in prompt templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Coordinator,
    Planner,
    Researcher,
    Coder,
    Reporter,
}

impl PromptTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            PromptTemplate::Coordinator => "coordinator",
            PromptTemplate::Planner => "planner",
            PromptTemplate::Researcher => "researcher",
            PromptTemplate::Coder => "coder",
            PromptTemplate::Reporter => "reporter",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            PromptTemplate::Coordinator => include_str!("coordinator.md"),
            PromptTemplate::Planner => include_str!("planner.md"),
            PromptTemplate::Researcher => include_str!("researcher.md"),
            PromptTemplate::Coder => include_str!("coder.md"),
            PromptTemplate::Reporter => include_str!("reporter.md"),
        }
    }
}

/// Variables substituted into a template
#[derive(Debug, Clone)]
pub struct PromptVars {
    values: HashMap<String, String>,
}

impl Default for PromptVars {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptVars {
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(
            "CURRENT_TIME".to_string(),
            chrono::Local::now()
                .format("%a %b %d %Y %H:%M:%S %z")
                .to_string(),
        );
        Self { values }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(name.into(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Render a template. Unknown placeholders are left in place.
pub fn render(template: PromptTemplate, vars: &PromptVars) -> String {
    substitute(template.source(), vars)
}

/// Render `template` as a system message and prepend it to `messages`.
pub fn apply_prompt_template(
    template: PromptTemplate,
    vars: &PromptVars,
    messages: &[ConversationMessage],
) -> Vec<ConversationMessage> {
    let mut rendered = Vec::with_capacity(messages.len() + 1);
    rendered.push(ConversationMessage::system(render(template, vars)));
    rendered.extend_from_slice(messages);
    rendered
}

fn substitute(source: &str, vars: &PromptVars) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
