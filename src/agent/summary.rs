//! Follow-up summary
//!
//! Turns the results of a tool round into the synthetic assistant message
//! that is sent back to the model, preserving request order.

use serde_json::Value;

use crate::context::estimate_messages_tokens;
use crate::llm::Message;
use crate::tools::catalog::SEARCH_MEDICAL_LITERATURE;
use crate::tools::{ToolCallResult, ToolPayload, UNKNOWN_ERROR};

/// Summary text plus the citations gathered from literature results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowupSummary {
    pub text: String,
    /// De-duplicated, first-seen order
    pub citations: Vec<String>,
}

fn records(payload: &ToolPayload) -> Vec<&Value> {
    match payload {
        ToolPayload::FhirQuery { data, .. } => data
            .get("entry")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| entry.get("resource").unwrap_or(entry))
                    .collect()
            })
            .unwrap_or_default(),
        ToolPayload::PatientInfo { data } => vec![data],
        ToolPayload::LiteratureSearch { .. } => Vec::new(),
    }
}

fn summarize_counted(result: &ToolCallResult, count: usize, max_records: usize) -> String {
    let shown: Vec<&Value> = result
        .payload
        .as_ref()
        .map(records)
        .unwrap_or_default()
        .into_iter()
        .take(max_records)
        .collect();

    let excerpt = serde_json::to_string_pretty(&shown).unwrap_or_else(|_| "[]".to_string());
    let mut block = format!(
        "[{}] Found {} records.\n```json\n{}\n```",
        result.tool_name, count, excerpt
    );
    if count > shown.len() {
        block.push_str(&format!(
            "\n... {} more record(s) omitted",
            count - shown.len()
        ));
    }
    block
}

fn summarize_missing(result: &ToolCallResult) -> String {
    let mut line = format!(
        "[{}] No records found. Reason: {}",
        result.tool_name, result.summary
    );
    if let Some(error) = &result.error {
        line.push_str(&format!(" ({})", error));
    }
    line
}

/// Build the follow-up summary for a round of tool results
pub fn summarize_tool_results(results: &[ToolCallResult], max_records: usize) -> FollowupSummary {
    let mut summary = FollowupSummary::default();
    let mut blocks = Vec::with_capacity(results.len());

    for result in results {
        let block = match &result.payload {
            Some(ToolPayload::LiteratureSearch { content, citations }) if result.success => {
                for url in citations {
                    if !summary.citations.contains(url) {
                        summary.citations.push(url.clone());
                    }
                }
                format!("[{}]\n{}", result.tool_name, content)
            }
            _ if result.tool_name == SEARCH_MEDICAL_LITERATURE => format!(
                "[{}] Literature search failed: {}",
                result.tool_name,
                result.error.as_deref().unwrap_or(UNKNOWN_ERROR)
            ),
            _ => match result.count() {
                Some(count) if result.success && count > 0 => {
                    summarize_counted(result, count, max_records)
                }
                _ => summarize_missing(result),
            },
        };
        blocks.push(block);
    }

    summary.text = blocks.join("\n\n");
    summary
}

/// Synthetic assistant message carrying the summary
pub fn summary_message(summary: &FollowupSummary) -> Message {
    Message::assistant(format!("Tool results:\n\n{}", summary.text))
}

/// User message restating the original question
pub fn restated_question(question: &str) -> Message {
    Message::user(format!(
        "Using the tool results above, answer my original question: {}",
        question
    ))
}

/// Follow-up messages that fit the remaining context budget
#[derive(Debug, Clone, PartialEq)]
pub struct FollowupRound {
    pub summary: FollowupSummary,
    /// Summary message followed by the restated question
    pub messages: Vec<Message>,
    /// Records per tool that survived in the JSON excerpt
    pub records_shown: usize,
}

impl FollowupRound {
    pub fn tokens(&self) -> usize {
        estimate_messages_tokens(&self.messages)
    }
}

fn followup_round(results: &[ToolCallResult], question: &str, records: usize) -> FollowupRound {
    let summary = summarize_tool_results(results, records);
    let messages = vec![summary_message(&summary), restated_question(question)];
    FollowupRound {
        summary,
        messages,
        records_shown: records,
    }
}

/// Build the follow-up pair, shrinking the JSON excerpt until it fits `available` tokens
///
/// Returns the token cost of the smallest possible pair when even an excerpt
/// of zero records does not fit.
pub fn fit_followup(
    results: &[ToolCallResult],
    question: &str,
    max_records: usize,
    available: usize,
) -> Result<FollowupRound, usize> {
    let mut smallest = 0;
    for records in (0..=max_records).rev() {
        let round = followup_round(results, question, records);
        let tokens = round.tokens();
        if tokens <= available {
            if records < max_records {
                tracing::warn!(
                    "[Summary] Follow-up excerpt reduced to {} record(s) per tool to fit {} tokens",
                    records,
                    available
                );
            }
            return Ok(round);
        }
        smallest = tokens;
    }
    Err(smallest)
}
