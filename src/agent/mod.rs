//! Routing agent - single-turn question answering
//!
//! ROUTER → {SEARCH | CALCULATOR | DIRECT} → SYNTHESIZER
//!
//! The router is the only branch. Every node reads the accumulated
//! [`RoutingState`] and returns a [`RoutingUpdate`] that the driver merges.
//! LLM failures in any node abort the whole run.

use crate::error::AgentError;
use crate::llm::{
    LlmClient, DIRECT_OPTIONS, EXTRACTION_OPTIONS, ROUTER_OPTIONS, SYNTHESIS_OPTIONS,
};
use crate::models::{RoutingNode, RoutingState, RoutingUpdate, ToolChoice};
use crate::prompts::{self, render};
use crate::tools::{calculator, WebSearch, DEFAULT_MAX_RESULTS};
use crate::Result;
use minijinja::context;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Single-turn routing machine
pub struct RoutingAgent {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn WebSearch>,
}

impl RoutingAgent {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn WebSearch>) -> Self {
        Self { llm, search }
    }

    /// Run one question to completion
    pub async fn invoke(&self, question: &str) -> Result<RoutingState> {
        let run_id = Uuid::new_v4();
        self.run(question)
            .instrument(info_span!("routing_run", %run_id))
            .await
    }

    async fn run(&self, question: &str) -> Result<RoutingState> {
        info!(question = %question, "Routing agent: starting run");

        let mut state = RoutingState::new(question);

        // === ROUTE ===
        let update = self.router_node(&state).await?;
        state.apply(RoutingNode::Router, update)?;

        let choice = state.tool_choice.ok_or_else(|| {
            AgentError::InvalidTransition("router finished without a tool choice".to_string())
        })?;

        // === EXECUTE ===
        let update = match choice {
            ToolChoice::Search => self.search_node(&state).await,
            ToolChoice::Calculator => self.calculator_node(&state).await?,
            ToolChoice::Direct => self.direct_node(&state).await?,
        };
        state.apply(choice.into(), update)?;

        // === SYNTHESIZE ===
        let update = self.synthesizer_node(&state).await?;
        state.apply(RoutingNode::Synthesizer, update)?;

        info!(tool_choice = %choice, "Routing agent: run complete");
        Ok(state)
    }

    /// Classify the question. Anything but an exact label falls back to
    /// `direct`.
    pub async fn router_node(&self, state: &RoutingState) -> Result<RoutingUpdate> {
        let prompt = render(prompts::ROUTER, context! { question => state.question.as_str() })?;
        let response = self.llm.generate(&prompt, ROUTER_OPTIONS).await?;

        let choice = match ToolChoice::from_label(&response) {
            Some(choice) => choice,
            None => {
                warn!(response = %response.trim(), "Invalid tool choice, defaulting to direct");
                ToolChoice::Direct
            }
        };

        info!(tool_choice = %choice, "Router decided");
        Ok(RoutingUpdate::tool_choice(choice))
    }

    pub async fn search_node(&self, state: &RoutingState) -> RoutingUpdate {
        let results = self.search.search(&state.question, DEFAULT_MAX_RESULTS).await;
        debug!(chars = results.len(), "Search complete");
        RoutingUpdate::tool_output(results)
    }

    /// Extract the arithmetic with the LLM, then evaluate it locally.
    /// Evaluator errors end up in the output text.
    pub async fn calculator_node(&self, state: &RoutingState) -> Result<RoutingUpdate> {
        let prompt = render(
            prompts::EXPRESSION_EXTRACTION,
            context! { question => state.question.as_str() },
        )?;
        let expression = self.llm.generate(&prompt, EXTRACTION_OPTIONS).await?;
        let expression = expression.trim();

        let result = calculator::evaluate(expression);
        debug!(expression = %expression, result = %result, "Calculation complete");

        Ok(RoutingUpdate::tool_output(format!(
            "Calculation: {} = {}",
            expression, result
        )))
    }

    pub async fn direct_node(&self, state: &RoutingState) -> Result<RoutingUpdate> {
        let prompt = render(prompts::DIRECT_ANSWER, context! { question => state.question.as_str() })?;
        let answer = self.llm.generate(&prompt, DIRECT_OPTIONS).await?;
        Ok(RoutingUpdate::tool_output(answer.trim()))
    }

    /// Direct answers pass through untouched; tool output is rewritten into
    /// an answer by the LLM.
    pub async fn synthesizer_node(&self, state: &RoutingState) -> Result<RoutingUpdate> {
        let tool_output = state.tool_output.as_deref().ok_or_else(|| {
            AgentError::InvalidTransition("synthesizer reached without tool output".to_string())
        })?;

        if state.tool_choice == Some(ToolChoice::Direct) {
            return Ok(RoutingUpdate::final_answer(tool_output));
        }

        let prompt = render(
            prompts::SYNTHESIZER,
            context! { question => state.question.as_str(), tool_output => tool_output },
        )?;
        let answer = self.llm.generate(&prompt, SYNTHESIS_OPTIONS).await?;
        Ok(RoutingUpdate::final_answer(answer.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ROUTE: &str = "Respond with ONLY ONE WORD";
    const EXTRACT: &str = "Extract ONLY the mathematical expression";
    const SYNTH: &str = "Information gathered from tools";
    const DIRECT: &str = "Answer this question directly";

    #[derive(Default)]
    struct StubSearch {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebSearch for StubSearch {
        async fn search(&self, query: &str, _max_results: usize) -> String {
            self.queries.lock().unwrap().push(query.to_string());
            "search results stub".to_string()
        }
    }

    fn agent(llm: &Arc<ScriptedLlm>, search: &Arc<StubSearch>) -> RoutingAgent {
        RoutingAgent::new(llm.clone(), search.clone())
    }

    #[tokio::test]
    async fn test_calculator_path() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .on(ROUTE, "calculator")
                .on(EXTRACT, "157 * 23")
                .on(SYNTH, "157 times 23 is 3611."),
        );
        let search = Arc::new(StubSearch::default());

        let state = agent(&llm, &search).invoke("What is 157 * 23?").await.unwrap();

        assert_eq!(state.tool_choice, Some(ToolChoice::Calculator));
        assert_eq!(state.tool_output.as_deref(), Some("Calculation: 157 * 23 = 3611"));
        assert_eq!(state.final_answer.as_deref(), Some("157 times 23 is 3611."));
        assert_eq!(
            state.trace,
            vec![RoutingNode::Router, RoutingNode::Calculator, RoutingNode::Synthesizer]
        );
        assert!(state.is_complete());
        assert_eq!(llm.call_count(), 3);
        assert!(search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_path_passes_question_verbatim() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .on(ROUTE, " Search\n")
                .on("search results stub", "Synthesized search answer"),
        );
        let search = Arc::new(StubSearch::default());

        let state = agent(&llm, &search).invoke("Latest AI news").await.unwrap();

        assert_eq!(state.tool_choice, Some(ToolChoice::Search));
        assert_eq!(state.tool_output.as_deref(), Some("search results stub"));
        assert_eq!(state.final_answer.as_deref(), Some("Synthesized search answer"));
        assert_eq!(*search.queries.lock().unwrap(), vec!["Latest AI news".to_string()]);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].0.contains(SYNTH));
        assert_eq!(prompts[1].1, SYNTHESIS_OPTIONS);
    }

    #[tokio::test]
    async fn test_direct_answer_passes_through() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .on(ROUTE, "direct")
                .on(DIRECT, "  Python is a programming language.\n"),
        );
        let search = Arc::new(StubSearch::default());

        let state = agent(&llm, &search).invoke("What is Python?").await.unwrap();

        assert_eq!(state.tool_output.as_deref(), Some("Python is a programming language."));
        assert_eq!(state.final_answer, state.tool_output);
        // Router + direct only; the synthesizer never calls the LLM here
        assert_eq!(llm.call_count(), 2);
        assert_eq!(
            state.trace,
            vec![RoutingNode::Router, RoutingNode::Direct, RoutingNode::Synthesizer]
        );
    }

    #[tokio::test]
    async fn test_unrecognized_route_falls_back_to_direct() {
        for response in ["I would use search", "calc", "", "search.", "`calculator`"] {
            let llm = Arc::new(ScriptedLlm::new().on(ROUTE, response).on(DIRECT, "answer"));
            let search = Arc::new(StubSearch::default());

            let state = agent(&llm, &search).invoke("Anything").await.unwrap();
            assert_eq!(state.tool_choice, Some(ToolChoice::Direct), "response {:?}", response);
            assert_eq!(state.final_answer.as_deref(), Some("answer"));
        }
    }

    #[tokio::test]
    async fn test_template_syntax_in_question_is_literal() {
        let llm = Arc::new(ScriptedLlm::new().on(ROUTE, "direct").on(DIRECT, "It is a placeholder."));
        let search = Arc::new(StubSearch::default());

        let question = "What does {{ name }} mean in {% raw %}?";
        let state = agent(&llm, &search).invoke(question).await.unwrap();

        assert_eq!(state.final_answer.as_deref(), Some("It is a placeholder."));
        assert!(llm.prompts()[0].0.contains(question));
        assert!(llm.prompts()[1].0.contains(question));
    }

    #[tokio::test]
    async fn test_router_uses_low_temperature_and_short_cap() {
        let llm = Arc::new(ScriptedLlm::new().on(ROUTE, "direct"));
        let search = Arc::new(StubSearch::default());
        let agent = agent(&llm, &search);

        let update = agent.router_node(&RoutingState::new("hi")).await.unwrap();
        assert_eq!(update, RoutingUpdate::tool_choice(ToolChoice::Direct));
        assert_eq!(llm.prompts()[0].1, ROUTER_OPTIONS);
    }

    #[tokio::test]
    async fn test_bad_extraction_is_embedded_not_raised() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .on(ROUTE, "calculator")
                .on(EXTRACT, "the answer is x")
                .on(SYNTH, "I could not compute that."),
        );
        let search = Arc::new(StubSearch::default());

        let state = agent(&llm, &search).invoke("What is x?").await.unwrap();
        let output = state.tool_output.unwrap();
        assert!(output.starts_with("Calculation: the answer is x = Error:"));
    }

    #[tokio::test]
    async fn test_division_by_zero_is_embedded() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .on(ROUTE, "calculator")
                .on(EXTRACT, "10 / 0")
                .otherwise("Division by zero is undefined."),
        );
        let search = Arc::new(StubSearch::default());

        let state = agent(&llm, &search).invoke("What is 10 divided by 0?").await.unwrap();
        assert_eq!(state.tool_output.as_deref(), Some("Calculation: 10 / 0 = Error: Division by zero"));
    }

    #[tokio::test]
    async fn test_router_failure_is_fatal() {
        let llm = Arc::new(ScriptedLlm::new().otherwise_fail("connection refused"));
        let search = Arc::new(StubSearch::default());

        let err = agent(&llm, &search).invoke("What is Python?").await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_fatal() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .on(ROUTE, "search")
                .fail_on(SYNTH, "model crashed"),
        );
        let search = Arc::new(StubSearch::default());

        let result = agent(&llm, &search).invoke("Latest AI news").await;
        assert!(result.is_err());
        assert_eq!(search.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_synthesizer_requires_tool_output() {
        let llm = Arc::new(ScriptedLlm::new());
        let search = Arc::new(StubSearch::default());
        let mut state = RoutingState::new("q");
        state
            .apply(RoutingNode::Router, RoutingUpdate::tool_choice(ToolChoice::Search))
            .unwrap();

        let err = agent(&llm, &search).synthesizer_node(&state).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidTransition(_)));
        assert_eq!(llm.call_count(), 0);
    }
}
