//! Conversational agent with memory
//!
//! CONTEXT → ANSWER → MEMORY, strictly sequential.
//!
//! The caller owns the history and passes it back in on every turn. A turn
//! never fails because the LLM did: context and answer failures are turned
//! into placeholder text so the conversation can go on.

use crate::error::AgentError;
use crate::llm::{LlmClient, CONTEXT_OPTIONS, CONVERSATION_OPTIONS};
use crate::memory::{format_history, Message};
use crate::models::{ConversationState, ConversationUpdate};
use crate::prompts::{self, render};
use crate::Result;
use minijinja::context;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Context used when there is no history to search
pub const NO_PRIOR_CONVERSATION: &str = "No relevant prior conversation.";
/// Context rendered into the answer prompt when none was retrieved
pub const NO_CONTEXT: &str = "No prior context available.";

/// Multi-turn machine; holds no conversation state of its own
pub struct ConversationalAgent {
    llm: Arc<dyn LlmClient>,
}

impl ConversationalAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Run one turn. `messages` is copied; the returned state carries the
    /// extended history.
    pub async fn invoke(&self, messages: &[Message], question: &str) -> Result<ConversationState> {
        let turn_id = Uuid::new_v4();
        self.run(messages, question)
            .instrument(info_span!("conversation_turn", %turn_id, history = messages.len()))
            .await
    }

    /// Run one turn and replace `history` with the extended history.
    /// Returns the answer.
    pub async fn respond(&self, history: &mut Vec<Message>, question: &str) -> Result<String> {
        let state = self.invoke(history, question).await?;
        let answer = state.answer.unwrap_or_default();
        *history = state.messages;
        Ok(answer)
    }

    async fn run(&self, messages: &[Message], question: &str) -> Result<ConversationState> {
        let mut state = ConversationState::new(messages.to_vec(), question);

        let update = self.context_node(&state).await;
        state.apply(update)?;

        let update = self.answer_node(&state).await;
        state.apply(update)?;

        let update = self.memory_node(&state)?;
        state.apply(update)?;

        info!(messages = state.messages.len(), "Conversation turn complete");
        Ok(state)
    }

    /// Summarize history relevant to the current question.
    /// Skips the LLM entirely for a fresh conversation.
    pub async fn context_node(&self, state: &ConversationState) -> ConversationUpdate {
        if state.messages.is_empty() {
            debug!("No history, skipping context retrieval");
            return context_update(NO_PRIOR_CONVERSATION.to_string());
        }

        let context = match self.summarize(state).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Memory retrieval failed, continuing without context");
                format!("Memory retrieval unavailable: {}", e)
            }
        };

        context_update(context)
    }

    pub async fn answer_node(&self, state: &ConversationState) -> ConversationUpdate {
        let answer = match self.compose_answer(state).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Answer generation failed");
                format!("Sorry, I could not generate an answer right now: {}", e)
            }
        };

        ConversationUpdate {
            answer: Some(answer),
            ..ConversationUpdate::default()
        }
    }

    async fn summarize(&self, state: &ConversationState) -> Result<String> {
        let prompt = render(
            prompts::MEMORY_SUMMARY,
            context! {
                history => format_history(&state.messages),
                question => state.current_question.as_str(),
            },
        )?;
        self.llm.generate(&prompt, CONTEXT_OPTIONS).await
    }

    async fn compose_answer(&self, state: &ConversationState) -> Result<String> {
        let prompt = render(
            prompts::CONVERSATION_ANSWER,
            context! {
                history => format_history(&state.messages),
                context => state.retrieved_context.as_deref().unwrap_or(NO_CONTEXT),
                question => state.current_question.as_str(),
            },
        )?;
        self.llm.generate(&prompt, CONVERSATION_OPTIONS).await
    }

    /// Append this turn to a copy of the history
    pub fn memory_node(&self, state: &ConversationState) -> Result<ConversationUpdate> {
        let answer = state.answer.as_deref().ok_or_else(|| {
            AgentError::InvalidTransition("memory update reached without an answer".to_string())
        })?;

        let mut messages = Vec::with_capacity(state.messages.len() + 2);
        messages.extend_from_slice(&state.messages);
        messages.push(Message::user(state.current_question.as_str()));
        messages.push(Message::assistant(answer));

        Ok(ConversationUpdate {
            messages: Some(messages),
            ..ConversationUpdate::default()
        })
    }
}

fn context_update(context: String) -> ConversationUpdate {
    ConversationUpdate {
        retrieved_context: Some(context),
        ..ConversationUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::memory::MessageRole;

    const SUMMARY: &str = "Summarize the key facts";
    const CONTINUE: &str = "continuing a conversation";

    fn start_messages() -> Vec<Message> {
        vec![
            Message::user("Who created LangGraph?"),
            Message::assistant("LangChain created it."),
        ]
    }

    #[tokio::test]
    async fn test_turn_updates_memory() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .on(SUMMARY, "We discussed LangGraph and LangChain.")
                .on(CONTINUE, "LangChain also built LangServe."),
        );
        let agent = ConversationalAgent::new(llm.clone());
        let prior = start_messages();

        let state = agent.invoke(&prior, "What else has that team built?").await.unwrap();

        assert!(state.retrieved_context.as_deref().unwrap().starts_with("We discussed"));
        assert_eq!(state.answer.as_deref(), Some("LangChain also built LangServe."));
        assert_eq!(state.messages.len(), prior.len() + 2);
        assert_eq!(&state.messages[..2], &prior[..]);
        assert_eq!(state.messages[2], Message::user("What else has that team built?"));
        assert_eq!(state.messages[3], Message::assistant("LangChain also built LangServe."));

        // Caller's history is untouched
        assert_eq!(prior, start_messages());
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_context_prompt_renders_history() {
        let llm = Arc::new(ScriptedLlm::new().otherwise("ok"));
        let agent = ConversationalAgent::new(llm.clone());

        agent.invoke(&start_messages(), "Anything else?").await.unwrap();

        let prompts = llm.prompts();
        assert!(prompts[0].0.contains("User: Who created LangGraph?\nAssistant: LangChain created it."));
        assert!(prompts[0].0.contains("Current question: Anything else?"));
        assert_eq!(prompts[0].1, CONTEXT_OPTIONS);
        assert!(prompts[1].0.contains("Relevant context:\nok"));
        assert_eq!(prompts[1].1, CONVERSATION_OPTIONS);
    }

    #[tokio::test]
    async fn test_empty_history_skips_context_llm_call() {
        let llm = Arc::new(ScriptedLlm::new().on(CONTINUE, "Hello!"));
        let agent = ConversationalAgent::new(llm.clone());

        let state = ConversationState::new(Vec::new(), "Hi");
        let update = agent.context_node(&state).await;
        assert_eq!(update.retrieved_context.as_deref(), Some(NO_PRIOR_CONVERSATION));
        assert_eq!(llm.call_count(), 0);

        let state = agent.invoke(&[], "Hi").await.unwrap();
        assert_eq!(state.retrieved_context.as_deref(), Some(NO_PRIOR_CONVERSATION));
        assert_eq!(llm.call_count(), 1);
        assert!(llm.prompts()[0].0.contains("No previous messages."));
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_context_failure_is_recovered() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .fail_on(SUMMARY, "connection refused")
                .on(CONTINUE, "Still answering."),
        );
        let agent = ConversationalAgent::new(llm);

        let state = agent.invoke(&start_messages(), "And then?").await.unwrap();

        let context = state.retrieved_context.unwrap();
        assert!(context.starts_with("Memory retrieval unavailable:"));
        assert!(context.contains("connection refused"));
        assert_eq!(state.answer.as_deref(), Some("Still answering."));
    }

    #[tokio::test]
    async fn test_answer_failure_is_recovered() {
        let llm = Arc::new(ScriptedLlm::new().otherwise_fail("model not found"));
        let agent = ConversationalAgent::new(llm);

        let state = agent.invoke(&start_messages(), "And then?").await.unwrap();

        let answer = state.answer.unwrap();
        assert!(answer.starts_with("Sorry, I could not generate an answer right now:"));
        assert!(answer.contains("model not found"));
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.messages[3].role, MessageRole::Assistant);
        assert_eq!(state.messages[3].content, answer);
    }

    #[tokio::test]
    async fn test_answer_prompt_without_context_uses_sentinel() {
        let llm = Arc::new(ScriptedLlm::new().otherwise("fine"));
        let agent = ConversationalAgent::new(llm.clone());

        let update = agent.answer_node(&ConversationState::new(Vec::new(), "Hi")).await;
        assert_eq!(update.answer.as_deref(), Some("fine"));
        assert!(llm.prompts()[0].0.contains(NO_CONTEXT));
    }

    #[test]
    fn test_memory_node_requires_answer() {
        let agent = ConversationalAgent::new(Arc::new(ScriptedLlm::new()));
        let err = agent
            .memory_node(&ConversationState::new(Vec::new(), "Hi"))
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_respond_carries_history_across_turns() {
        let llm = Arc::new(ScriptedLlm::new().otherwise("noted"));
        let agent = ConversationalAgent::new(llm);
        let mut history = Vec::new();

        for (turn, question) in ["first", "second", "third"].into_iter().enumerate() {
            let answer = agent.respond(&mut history, question).await.unwrap();
            assert_eq!(answer, "noted");
            assert_eq!(history.len(), (turn + 1) * 2);
        }

        assert_eq!(history[4], Message::user("third"));
    }
}
