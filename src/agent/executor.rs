//! Tool Executor
//!
//! Dispatches a round of tool calls concurrently and collects exactly one
//! result per call, in request order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::llm::ToolCallRequest;
use crate::tools::{ToolCallResult, ToolContext, ToolRegistry, UNKNOWN_ERROR};

/// Handles concurrent tool execution
pub struct ToolExecutor;

impl ToolExecutor {
    /// Execute every call on its own task
    ///
    /// Returns `None` when `cancel` fires first; in-flight tasks are aborted
    /// rather than awaited. A task that panics yields a failed result.
    pub async fn execute_all(
        tools: &Arc<ToolRegistry>,
        calls: &[ToolCallRequest],
        context: &ToolContext,
        cancel: &CancellationToken,
    ) -> Option<Vec<ToolCallResult>> {
        if cancel.is_cancelled() {
            return None;
        }

        let handles: Vec<_> = calls
            .iter()
            .map(|call| {
                let tools = Arc::clone(tools);
                let call = call.clone();
                let context = context.clone();
                tracing::info!("[Executor] Dispatching {} ({})", call.name, call.id);
                tokio::spawn(async move { tools.execute(&call.name, &call.arguments, &context).await })
            })
            .collect();
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::info!(
                    "[Executor] Cancelled with {} tool call(s) in flight",
                    abort_handles.len()
                );
                for handle in abort_handles {
                    handle.abort();
                }
                None
            }

            joined = futures::future::join_all(handles) => {
                let results = joined
                    .into_iter()
                    .zip(calls)
                    .map(|(outcome, call)| match outcome {
                        Ok(result) => {
                            tracing::debug!(
                                "[Executor] {} completed (success: {})",
                                call.name,
                                result.success
                            );
                            result
                        }
                        Err(e) => {
                            tracing::error!("[Executor] {} task did not complete: {}", call.name, e);
                            ToolCallResult::failure(
                                &call.name,
                                format!("Tool {} did not complete", call.name),
                                UNKNOWN_ERROR,
                            )
                        }
                    })
                    .collect();
                Some(results)
            }
        }
    }
}
