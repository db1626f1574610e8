//! Prompt templates
//!
//! Each template is a Jinja source with `{{ name }}` slots, rendered through
//! `minijinja` by [`render`]. Node logic only picks a template and supplies
//! values.

use crate::Result;
use minijinja::{Environment, UndefinedBehavior, Value};
use std::sync::OnceLock;

pub const ROUTER: &str = r#"You are a routing assistant. Your job is to decide which tool to use.

Question: "{{ question }}"

Available tools:
- "search": Use for questions about current events, news, facts that change, or things happening now
  Examples: "What happened today?", "Who won the election?", "Latest AI news"

- "calculator": Use for mathematical calculations and numerical operations
  Examples: "What is 25 * 17?", "Calculate 2^10", "100 / 7"

- "direct": Use if you can answer from your general knowledge without external tools
  Examples: "What is Python?", "Explain machine learning", "What is the capital of France?"

Think step by step:
1. Does this need current/recent information? → search
2. Does this need precise calculation? → calculator
3. Can I answer from general knowledge? → direct

Respond with ONLY ONE WORD: search, calculator, or direct"#;

pub const EXPRESSION_EXTRACTION: &str = r#"Extract ONLY the mathematical expression from this question. Return just the numbers and operators, nothing else.

Question: {{ question }}

Mathematical expression:"#;

pub const DIRECT_ANSWER: &str = r#"You are a helpful assistant. Answer this question directly using your knowledge.

Question: {{ question }}

Instructions:
- Be concise (2-4 sentences)
- Be factual
- If you're not sure, say so

Answer:"#;

pub const SYNTHESIZER: &str = r#"You are a helpful assistant. Answer the user's question based on the information provided.

Question: {{ question }}

Information gathered from tools:
{{ tool_output }}

Instructions:
- Answer directly and concisely
- Use the information provided
- If information is insufficient, say so
- Be factual and precise

Answer:"#;

pub const MEMORY_SUMMARY: &str = r#"You are a conversation memory module.

Conversation so far:
{{ history }}

Current question: {{ question }}

Summarize the key facts or answers that are relevant to the current question.
Keep it to 3 bullet points or fewer."#;

pub const CONVERSATION_ANSWER: &str = r#"You are a helpful assistant continuing a conversation.

Conversation so far:
{{ history }}

Relevant context:
{{ context }}

User question: {{ question }}

Answer concisely (3-5 sentences) using the relevant context when available."#;

static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> &'static Environment<'static> {
    ENVIRONMENT.get_or_init(|| {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env
    })
}

/// Render a template with the given context.
///
/// A slot the context does not provide is an error, never an empty string.
pub fn render(template: &str, ctx: Value) -> Result<String> {
    let prompt = environment().render_str(template, ctx)?;
    Ok(prompt)
}
