//! Clinical Agent Loop
//!
//! Runs a single user turn:
//! - Prompt assembly and context window truncation
//! - Model call with the tool catalog
//! - Concurrent tool dispatch and one follow-up round
//! - Streaming of the final answer as whole-buffer chunks
//! - Citation linkification
//! - Conversation naming after the first turn (detached)

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::citations::process_citations;
use crate::context::{
    estimate_message_tokens, estimate_tokens, truncate_to_context_window, ContextConfig,
};
use crate::core::{AgentError, AgentResult, AgentTurnOutput, ChunkSink, TurnState, TurnTracker};
use crate::helpers::spawn_conversation_naming;
use crate::llm::{Message, ModelProvider, ModelReply, Role};
use crate::prompt::{build_system_prompt, SystemPromptInput};
use crate::tools::{ToolCallResult, ToolContext, ToolRegistry};

use super::config::AgentConfig;
use super::executor::ToolExecutor;
use super::summary::{fit_followup, FollowupSummary};

/// Input for one agent turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// The new user message
    pub user_message: String,

    /// Prior user/assistant messages, oldest first. System messages are
    /// ignored; the turn's system prompt comes from `system_prompt`.
    pub history: Vec<Message>,

    /// Full system prompt, usually from `ClinicalAgent::build_system_prompt`
    pub system_prompt: String,

    /// Model used for the context limit lookup (defaults to the provider's model)
    pub model_id: Option<String>,
}

impl TurnRequest {
    pub fn new(user_message: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            history: Vec::new(),
            system_prompt: system_prompt.into(),
            model_id: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}

/// Agent that answers clinical questions about one patient
///
/// # Example
///
/// ```ignore
/// let tools = ToolRegistry::clinical(fhir_client, None);
/// let agent = ClinicalAgent::new(AgentConfig::new().with_patient_id("p1"), llm, tools);
///
/// let prompt = agent.build_system_prompt(BASE_PROMPT, Some(&clinical_context));
/// let output = agent
///     .run_turn(TurnRequest::new("What are her active problems?", prompt), &sink, &cancel)
///     .await?;
/// ```
pub struct ClinicalAgent {
    config: AgentConfig,
    llm: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
}

impl ClinicalAgent {
    /// Create a new clinical agent
    pub fn new(config: AgentConfig, llm: Arc<dyn ModelProvider>, tools: ToolRegistry) -> Self {
        tracing::info!(
            "[ClinicalAgent] Created with {} tool(s) on {}/{}",
            tools.len(),
            llm.provider_name(),
            llm.model()
        );
        Self {
            config,
            llm,
            tools: Arc::new(tools),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Compose the system prompt for this agent's patient and tool set
    pub fn build_system_prompt(&self, base_prompt: &str, clinical_context: Option<&str>) -> String {
        let mut input = SystemPromptInput::new(base_prompt)
            .with_literature_key(self.tools.has_literature_search())
            .with_tools(self.tools.get_definitions());
        if let Some(patient_id) = &self.config.patient_id {
            input = input.with_patient_id(patient_id.clone());
        }
        if let Some(context) = clinical_context {
            input = input.with_clinical_context(context);
        }
        build_system_prompt(&input)
    }

    /// Run one user turn to completion, cancellation or failure
    ///
    /// Every chunk passed to `sink` is the whole answer so far. Cancellation
    /// resolves with `Ok` and the text accumulated before the token fired.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        sink: &dyn ChunkSink,
        cancel: &CancellationToken,
    ) -> AgentResult<AgentTurnOutput> {
        if request.user_message.trim().is_empty() {
            return Err(AgentError::InvalidInput("User message is empty".to_string()));
        }

        let turn_id = Uuid::new_v4().to_string();
        let mut tracker = TurnTracker::new(turn_id.clone());
        let model_id = request
            .model_id
            .clone()
            .unwrap_or_else(|| self.llm.model());
        let context_config = ContextConfig::new(&model_id, &request.system_prompt)
            .with_max_response_tokens(self.config.max_response_tokens);

        tracing::info!(
            "[ClinicalAgent] Turn {} started ({} prior message(s), model {})",
            turn_id,
            request.history.len(),
            model_id
        );

        let mut conversation: Vec<Message> = request
            .history
            .iter()
            .filter(|m| !m.is_system())
            .cloned()
            .collect();
        let first_turn = !conversation.iter().any(|m| m.role == Role::User);
        conversation.push(Message::user(request.user_message.clone()));

        let messages = self
            .bounded_messages(&conversation, &context_config)
            .map_err(|e| fail(&mut tracker, e))?;
        tracker.advance(TurnState::PromptBuilt);
        self.log_payload("Outgoing messages", &messages);

        // Model call with the tool catalog
        tracker.advance(TurnState::ModelRequested);
        let reply = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return Ok(cancelled(&mut tracker, turn_id, String::new(), Vec::new(), Vec::new()));
            }

            reply = self.llm.invoke(messages, self.tools.get_definitions()) => reply,
        };
        let reply = reply.map_err(|e| fail(&mut tracker, AgentError::provider(e)))?;

        let calls = match reply {
            ModelReply::ToolCalls(calls) if !calls.is_empty() => calls,
            ModelReply::ToolCalls(_) => {
                tracing::warn!("[ClinicalAgent] Model returned an empty tool call list");
                return Ok(self.direct_answer(&mut tracker, turn_id, String::new(), sink));
            }
            ModelReply::Text(text) => {
                let output = self.direct_answer(&mut tracker, turn_id, text, sink);
                if first_turn {
                    self.name_conversation(&conversation, &output.final_text);
                }
                return Ok(output);
            }
        };

        // Tool round
        tracker.advance(TurnState::ToolsRequested);
        tracing::info!(
            "[ClinicalAgent] Model requested {} tool call(s): {}",
            calls.len(),
            calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        tracker.advance(TurnState::ToolsExecuting);
        let context = ToolContext::new(self.config.patient_id.clone());
        let Some(tool_results) = ToolExecutor::execute_all(&self.tools, &calls, &context, cancel).await
        else {
            return Ok(cancelled(&mut tracker, turn_id, String::new(), Vec::new(), Vec::new()));
        };
        if self.config.debug_enabled {
            for result in &tool_results {
                tracing::debug!(
                    "[ClinicalAgent] Tool result {}: {}",
                    result.tool_name,
                    serde_json::to_string(result).unwrap_or_default()
                );
            }
        }

        // One-shot follow-up, streamed without tools
        tracker.advance(TurnState::FollowupRequested);
        let followup = self
            .followup_messages(&conversation, &tool_results, &request.user_message, &context_config)
            .map_err(|e| fail(&mut tracker, e))?;
        let summary = followup.summary;
        let followup = followup.messages;
        self.log_payload("Follow-up messages", &followup);

        tracker.advance(TurnState::ModelRequested);
        let stream = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return Ok(cancelled(&mut tracker, turn_id, String::new(), summary.citations, tool_results));
            }

            stream = self.llm.stream(followup) => stream,
        };
        let mut stream = stream.map_err(|e| fail(&mut tracker, AgentError::provider(e)))?;

        tracker.advance(TurnState::StreamingFinal);
        let mut accumulated = String::new();
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Ok(cancelled(&mut tracker, turn_id, accumulated, summary.citations, tool_results));
                }

                next = stream.next() => match next {
                    Some(Ok(delta)) => {
                        accumulated.push_str(&delta);
                        sink.on_chunk(&accumulated);
                    }
                    Some(Err(e)) => return Err(fail(&mut tracker, AgentError::provider(e))),
                    None => break,
                },
            }
        }

        let final_text = process_citations(&accumulated, &summary.citations);
        if final_text != accumulated {
            sink.on_chunk(&final_text);
        }
        tracker.advance(TurnState::Completed);
        tracing::info!(
            "[ClinicalAgent] Turn {} completed ({} chars, {} citation(s))",
            turn_id,
            final_text.len(),
            summary.citations.len()
        );

        if first_turn {
            self.name_conversation(&conversation, &final_text);
        }

        Ok(AgentTurnOutput {
            turn_id,
            final_text,
            citations: summary.citations,
            tool_results,
            final_state: tracker.state(),
        })
    }

    /// Truncate the conversation and prepend the system prompt
    fn bounded_messages(
        &self,
        conversation: &[Message],
        config: &ContextConfig,
    ) -> AgentResult<Vec<Message>> {
        let truncated = truncate_to_context_window(conversation, config);
        if truncated.is_empty() {
            let system_tokens = estimate_tokens(&config.system_prompt);
            let budget = config.budget().input_budget();
            if system_tokens >= budget {
                return Err(AgentError::PromptTooLarge {
                    system_tokens,
                    budget,
                });
            }
            return Err(AgentError::MessageTooLarge {
                message_tokens: conversation.last().map(estimate_message_tokens).unwrap_or(0),
                available: budget - system_tokens,
            });
        }

        let mut messages = Vec::with_capacity(truncated.len() + 1);
        messages.push(Message::system(config.system_prompt.clone()));
        messages.extend(truncated);
        Ok(messages)
    }

    /// Follow-up request: system prompt, as much history as fits, then the
    /// tool summary and restated question
    ///
    /// The summary pair is never truncated away; its JSON excerpt shrinks
    /// instead. History gets whatever budget is left.
    fn followup_messages(
        &self,
        conversation: &[Message],
        tool_results: &[ToolCallResult],
        question: &str,
        config: &ContextConfig,
    ) -> AgentResult<FollowupMessages> {
        let available = config
            .budget()
            .input_budget()
            .saturating_sub(estimate_tokens(&config.system_prompt));

        let round = fit_followup(
            tool_results,
            question,
            self.config.max_summary_records,
            available,
        )
        .map_err(|needed| AgentError::MessageTooLarge {
            message_tokens: needed,
            available,
        })?;

        let tail_tokens = round.tokens();
        let history = if available > tail_tokens {
            let history_config = config
                .clone()
                .with_max_response_tokens(config.budget().reserved_for_response + tail_tokens);
            truncate_to_context_window(conversation, &history_config)
        } else {
            Vec::new()
        };
        if history.len() < conversation.len() {
            tracing::info!(
                "[ClinicalAgent] Follow-up keeps {} of {} history message(s)",
                history.len(),
                conversation.len()
            );
        }

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(Message::system(config.system_prompt.clone()));
        messages.extend(history);
        messages.extend(round.messages);
        Ok(FollowupMessages {
            summary: round.summary,
            messages,
        })
    }

    fn direct_answer(
        &self,
        tracker: &mut TurnTracker,
        turn_id: String,
        text: String,
        sink: &dyn ChunkSink,
    ) -> AgentTurnOutput {
        tracker.advance(TurnState::DirectAnswer);
        tracker.advance(TurnState::StreamingFinal);
        sink.on_chunk(&text);
        tracker.advance(TurnState::Completed);
        tracing::info!("[ClinicalAgent] Turn {} answered directly", turn_id);

        AgentTurnOutput {
            turn_id,
            final_text: text,
            citations: Vec::new(),
            tool_results: Vec::new(),
            final_state: tracker.state(),
        }
    }

    /// Start background naming for the conversation's first exchange
    fn name_conversation(&self, opening: &[Message], answer: &str) {
        if !self.config.auto_name_conversation {
            return;
        }
        let Some(sink) = self.config.name_sink.clone() else {
            tracing::warn!("[ClinicalAgent] Conversation naming enabled without a name sink");
            return;
        };

        let mut messages: Vec<Message> = opening.to_vec();
        messages.push(Message::assistant(answer));
        // Handle dropped on purpose: the task runs detached and logs its own failures
        drop(spawn_conversation_naming(Arc::clone(&self.llm), messages, sink));
    }

    fn log_payload(&self, label: &str, messages: &[Message]) {
        if self.config.debug_enabled {
            tracing::debug!(
                "[ClinicalAgent] {}: {}",
                label,
                serde_json::to_string(messages).unwrap_or_default()
            );
        }
    }
}

struct FollowupMessages {
    summary: FollowupSummary,
    messages: Vec<Message>,
}

fn fail(tracker: &mut TurnTracker, err: AgentError) -> AgentError {
    tracker.advance(TurnState::Failed);
    tracing::error!("[ClinicalAgent] Turn failed: {}", err);
    err
}

fn cancelled(
    tracker: &mut TurnTracker,
    turn_id: String,
    partial_text: String,
    citations: Vec<String>,
    tool_results: Vec<ToolCallResult>,
) -> AgentTurnOutput {
    tracker.advance(TurnState::Cancelled);
    tracing::info!(
        "[ClinicalAgent] Turn {} cancelled with {} chars accumulated",
        turn_id,
        partial_text.len()
    );
    AgentTurnOutput {
        turn_id,
        final_text: partial_text,
        citations,
        tool_results,
        final_state: tracker.state(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{TextStream, ToolCallRequest, ToolDefinition};
    use crate::tools::{FhirClient, LiteratureSearchProvider, LiteratureSearchResponse};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Model provider that replays scripted replies and stream chunks
    #[derive(Default)]
    struct ScriptedProvider {
        replies: Mutex<VecDeque<anyhow::Result<ModelReply>>>,
        chunks: Vec<anyhow::Result<String>>,
        /// Never finish the stream after the scripted chunks
        hang_after_chunks: bool,
        invocations: Mutex<Vec<(Vec<Message>, Vec<ToolDefinition>)>>,
        streams: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<anyhow::Result<ModelReply>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn with_chunks(mut self, chunks: &[&str]) -> Self {
            self.chunks = chunks.iter().map(|c| Ok(c.to_string())).collect();
            self
        }

        fn invocation_count(&self) -> usize {
            self.invocations.lock().unwrap().len()
        }

        fn stream_count(&self) -> usize {
            self.streams.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn invoke(
            &self,
            messages: Vec<Message>,
            tools: Vec<ToolDefinition>,
        ) -> anyhow::Result<ModelReply> {
            self.invocations.lock().unwrap().push((messages, tools));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelReply::Text("unscripted".into())))
        }

        async fn stream(&self, messages: Vec<Message>) -> anyhow::Result<TextStream> {
            self.streams.lock().unwrap().push(messages);
            let chunks: Vec<anyhow::Result<String>> = self
                .chunks
                .iter()
                .map(|c| match c {
                    Ok(text) => Ok(text.clone()),
                    Err(e) => Err(anyhow::anyhow!(e.to_string())),
                })
                .collect();
            let hang = self.hang_after_chunks;
            Ok(Box::pin(async_stream::stream! {
                for chunk in chunks {
                    yield chunk;
                }
                if hang {
                    futures::future::pending::<()>().await;
                }
            }))
        }

        fn model(&self) -> String {
            "gpt-4o".into()
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }

    /// FHIR server returning one Condition, with an optional delay
    #[derive(Default)]
    struct FakeFhir {
        delay: Option<Duration>,
        response: Option<Value>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FhirClient for FakeFhir {
        async fn request(&self, query: &str) -> anyhow::Result<Value> {
            self.queries.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.response.clone().unwrap_or_else(|| {
                json!({
                    "resourceType": "Bundle",
                    "entry": [{"resource": {"resourceType": "Condition", "id": "htn", "code": {"text": "Hypertension"}}}]
                })
            }))
        }
    }

    struct CannedLiterature;

    #[async_trait]
    impl LiteratureSearchProvider for CannedLiterature {
        async fn search(&self, _query: &str) -> anyhow::Result<LiteratureSearchResponse> {
            Ok(LiteratureSearchResponse {
                success: true,
                content: "ACE inhibitors are first line [1].".into(),
                citations: vec!["https://example.org/ace".into()],
            })
        }
    }

    fn agent(provider: Arc<ScriptedProvider>, fhir: Arc<FakeFhir>) -> ClinicalAgent {
        ClinicalAgent::new(
            AgentConfig::new().with_patient_id("p1"),
            provider,
            ToolRegistry::clinical(fhir, None),
        )
    }

    fn recording_sink() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync) {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let captured = chunks.clone();
        (chunks, move |text: &str| captured.lock().unwrap().push(text.to_string()))
    }

    fn tool_call(name: &str, arguments: Value) -> anyhow::Result<ModelReply> {
        Ok(ModelReply::ToolCalls(vec![ToolCallRequest::new(name, arguments).with_id("call_1")]))
    }

    #[tokio::test]
    async fn test_direct_answer_single_chunk() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ModelReply::Text(
            "BP is well controlled.".into(),
        ))]));
        let agent = agent(provider.clone(), Arc::new(FakeFhir::default()));
        let (chunks, sink) = recording_sink();
        let prompt = agent.build_system_prompt("You are a clinical assistant.", None);

        let output = agent
            .run_turn(
                TurnRequest::new("How is her BP?", prompt.clone()),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(output.final_text, "BP is well controlled.");
        assert_eq!(output.final_state, TurnState::Completed);
        assert_eq!(*chunks.lock().unwrap(), vec!["BP is well controlled."]);
        assert_eq!(provider.stream_count(), 0);

        let invocations = provider.invocations.lock().unwrap();
        let (messages, tools) = &invocations[0];
        assert_eq!(messages[0], Message::system(prompt));
        assert_eq!(messages.last().unwrap(), &Message::user("How is her BP?"));
        assert_eq!(tools.len(), 8);
    }

    #[tokio::test]
    async fn test_tool_round_streams_followup() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![tool_call("query_conditions", json!({}))])
                .with_chunks(&["She has ", "hypertension."]),
        );
        let fhir = Arc::new(FakeFhir::default());
        let agent = agent(provider.clone(), fhir.clone());
        let (chunks, sink) = recording_sink();

        let output = agent
            .run_turn(
                TurnRequest::new("What conditions does she have?", "system"),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(output.final_text, "She has hypertension.");
        assert_eq!(output.final_state, TurnState::Completed);
        assert_eq!(
            *chunks.lock().unwrap(),
            vec!["She has ", "She has hypertension."]
        );
        assert_eq!(
            fhir.queries.lock().unwrap()[0],
            "Condition?patient=p1&_count=100&_sort=-recorded-date"
        );
        assert_eq!(output.tool_results.len(), 1);
        assert!(output.tool_results[0].success);

        // one model call with tools, one streamed follow-up without
        assert_eq!(provider.invocation_count(), 1);
        let streams = provider.streams.lock().unwrap();
        let followup = &streams[0];
        let n = followup.len();
        assert!(followup[n - 2].content.starts_with("Tool results:\n\n[query_conditions] Found 1 records."));
        assert!(followup[n - 1].content.ends_with("What conditions does she have?"));
    }

    #[tokio::test]
    async fn test_literature_citations_linkified() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![tool_call("search_medical_literature", json!({"query": "hypertension first line"}))])
                .with_chunks(&["Use an ACE inhibitor [1]."]),
        );
        let agent = ClinicalAgent::new(
            AgentConfig::new().with_patient_id("p1"),
            provider.clone(),
            ToolRegistry::clinical(
                Arc::new(FakeFhir::default()),
                Some(Arc::new(CannedLiterature) as Arc<dyn LiteratureSearchProvider>),
            ),
        );
        let (chunks, sink) = recording_sink();

        let output = agent
            .run_turn(
                TurnRequest::new("First line for hypertension?", "system"),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(output.citations, vec!["https://example.org/ace"]);
        assert!(output
            .final_text
            .contains("[[1]](https://example.org/ace)"));
        assert!(output.final_text.contains("**Sources:**"));
        assert_eq!(chunks.lock().unwrap().last().unwrap(), &output.final_text);
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(anyhow::anyhow!(
            "connection refused"
        ))]));
        let agent = agent(provider, Arc::new(FakeFhir::default()));

        let err = agent
            .run_turn(
                TurnRequest::new("hi", "system"),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Provider(msg) if msg == "connection refused"));
    }

    #[tokio::test]
    async fn test_stream_failure() {
        let mut scripted = ScriptedProvider::new(vec![tool_call("query_conditions", json!({}))]);
        scripted.chunks = vec![Ok("Partial".into()), Err(anyhow::anyhow!("stream reset"))];
        let agent = agent(Arc::new(scripted), Arc::new(FakeFhir::default()));

        let err = agent
            .run_turn(
                TurnRequest::new("Conditions?", "system"),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_cancel_during_tool_dispatch() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![tool_call("query_conditions", json!({}))]).with_chunks(&["never"]),
        );
        let fhir = Arc::new(FakeFhir {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let agent = agent(provider.clone(), fhir);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let output = tokio::time::timeout(
            Duration::from_secs(5),
            agent.run_turn(
                TurnRequest::new("Conditions?", "system"),
                &crate::core::NoopSink,
                &cancel,
            ),
        )
        .await
        .expect("cancelled turn must not hang")
        .unwrap();

        assert!(output.is_cancelled());
        assert_eq!(output.final_text, "");
        assert_eq!(provider.invocation_count(), 1);
        assert_eq!(provider.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_streaming_keeps_partial_text() {
        let mut scripted =
            ScriptedProvider::new(vec![tool_call("query_conditions", json!({}))]).with_chunks(&["Partial answer"]);
        scripted.hang_after_chunks = true;
        let agent = agent(Arc::new(scripted), Arc::new(FakeFhir::default()));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let sink = move |_text: &str| trigger.cancel();

        let output = agent
            .run_turn(TurnRequest::new("Conditions?", "system"), &sink, &cancel)
            .await
            .unwrap();

        assert_eq!(output.final_state, TurnState::Cancelled);
        assert_eq!(output.final_text, "Partial answer");
        assert_eq!(output.tool_results.len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_too_large() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = agent(provider.clone(), Arc::new(FakeFhir::default()));

        let err = agent
            .run_turn(
                TurnRequest::new("hi", "x".repeat(100_000)).with_model_id("unknown-model"),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::PromptTooLarge { budget: 11_000, .. }));
        assert_eq!(provider.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = agent(provider.clone(), Arc::new(FakeFhir::default()));

        let result = agent
            .run_turn(
                TurnRequest::new("   ", "system"),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await;
        let err = tokio_test::assert_err!(result);

        assert!(matches!(err, AgentError::InvalidInput(_)));
        assert_eq!(provider.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_history_system_messages_replaced() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ModelReply::Text("ok".into()))]));
        let agent = agent(provider.clone(), Arc::new(FakeFhir::default()));
        let history = vec![
            Message::system("stale prompt"),
            Message::user("Earlier question"),
            Message::assistant("Earlier answer"),
        ];

        agent
            .run_turn(
                TurnRequest::new("Follow up", "fresh prompt").with_history(history),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let invocations = provider.invocations.lock().unwrap();
        let contents: Vec<_> = invocations[0].0.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["fresh prompt", "Earlier question", "Earlier answer", "Follow up"]
        );
    }

    #[tokio::test]
    async fn test_first_turn_names_conversation() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ModelReply::Text("Her BP is 120/80.".into())),
            Ok(ModelReply::Text("Blood pressure check".into())),
        ]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let config = AgentConfig::new().with_conversation_naming(Arc::new(
            move |name: String| -> anyhow::Result<()> {
                tx.send(name).map_err(|e| anyhow::anyhow!(e.to_string()))
            },
        ));
        let agent = ClinicalAgent::new(
            config,
            provider,
            ToolRegistry::clinical(Arc::new(FakeFhir::default()), None),
        );

        agent
            .run_turn(
                TurnRequest::new("BP?", "system"),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let name = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Blood pressure check"));
    }

    #[tokio::test]
    async fn test_oversized_user_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = agent(provider.clone(), Arc::new(FakeFhir::default()));

        let err = agent
            .run_turn(
                TurnRequest::new("y".repeat(100_000), "system").with_model_id("unknown-model"),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::MessageTooLarge { message_tokens: 25_004, .. }));
        assert_eq!(provider.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_large_tool_results_still_reach_followup() {
        let entries: Vec<Value> = (0..10)
            .map(|i| {
                json!({"resource": {
                    "resourceType": "Observation",
                    "id": format!("obs-{}", i),
                    "note": "z".repeat(5_000),
                }})
            })
            .collect();
        let fhir = Arc::new(FakeFhir {
            response: Some(json!({"resourceType": "Bundle", "entry": entries})),
            ..Default::default()
        });
        let provider = Arc::new(
            ScriptedProvider::new(vec![tool_call("query_observations", json!({}))])
                .with_chunks(&["Vitals are stable."]),
        );
        let agent = agent(provider.clone(), fhir);
        let history = vec![
            Message::user("Earlier question"),
            Message::assistant("Earlier answer"),
        ];

        let output = agent
            .run_turn(
                TurnRequest::new("Any abnormal vitals?", "system")
                    .with_history(history)
                    .with_model_id("unknown-model"),
                &crate::core::NoopSink,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(output.final_state, TurnState::Completed);

        let streams = provider.streams.lock().unwrap();
        let followup = &streams[0];
        let n = followup.len();
        assert_eq!(followup[0].role, Role::System);
        assert_eq!(followup[n - 2].role, Role::Assistant);
        assert!(followup[n - 2]
            .content
            .starts_with("Tool results:\n\n[query_observations] Found 10 records."));
        assert!(followup[n - 2].content.contains("more record(s) omitted"));
        assert_eq!(followup[n - 1].role, Role::User);
        assert!(followup[n - 1].content.ends_with("Any abnormal vitals?"));
        assert!(crate::context::estimate_messages_tokens(followup) <= 11_000 + 4);
    }

    struct ImmunizationTool;

    #[async_trait]
    impl crate::tools::Tool for ImmunizationTool {
        fn name(&self) -> &str {
            "query_immunizations"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(
                "query_immunizations",
                "Get the patient's immunization history",
                Default::default(),
            )
        }

        async fn execute(&self, _input: &Value, _context: &ToolContext) -> ToolCallResult {
            ToolCallResult::failure("query_immunizations", "Not available", "offline")
        }
    }

    #[test]
    fn test_prompt_lists_registered_tools() {
        let mut tools = ToolRegistry::clinical(Arc::new(FakeFhir::default()), None);
        tools.register(ImmunizationTool);
        let agent = ClinicalAgent::new(
            AgentConfig::new().with_patient_id("p1"),
            Arc::new(ScriptedProvider::new(vec![])),
            tools,
        );

        let prompt = agent.build_system_prompt("Base", None);

        assert!(prompt.contains("9. **query_immunizations**: Get the patient's immunization history"));
        assert!(prompt.contains("1. **get_patient_info**"));
    }
}
