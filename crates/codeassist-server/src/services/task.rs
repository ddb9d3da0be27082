//! Task dispatch: prompt assembly and the single upstream completion call.

use codeassist_core::Task;
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::ServerState;

/// Runs `task` over `code` and returns the completion text.
///
/// Any failure is logged with its cause and surfaced only as the task's
/// static failure message.
pub async fn run(state: &ServerState, task: &Task, code: &str) -> Result<String, AppError> {
    debug!(task = task.label(), code_len = code.len(), "Dispatching task");

    match state.llm.complete(&task.prompt(code)).await {
        Ok(response) => {
            info!(
                task = task.label(),
                elapsed_ms = response.metrics.elapsed_ms,
                "Task completed"
            );
            Ok(response.content)
        }
        Err(e) => {
            error!("Error running {} task: {}", task.label(), e);
            Err(AppError::TaskFailed(task.failure_message()))
        }
    }
}
