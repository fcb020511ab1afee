//! Command Handlers
//!
//! Maps each decoded request onto the memory engine. Handlers are
//! synchronous; the server runs them on the blocking pool.

use crate::models::shard::GraduationOutcome;
use crate::models::turn::ForgetOutcome;
use crate::services::daemon::protocol::{Request, Response};
use crate::services::memory::{MemoryEngine, ShardExporter};
use crate::utils::error::{AppError, AppResult};

/// Everything a handler needs, shared across client tasks
pub struct DaemonContext {
    pub engine: MemoryEngine,
    pub exporter: ShardExporter,
}

impl DaemonContext {
    pub fn new(engine: MemoryEngine, exporter: ShardExporter) -> Self {
        Self { engine, exporter }
    }
}

/// Execute one request. Engine failures become `ok: false` responses.
pub fn dispatch(ctx: &DaemonContext, request: Request) -> Response {
    let command = request.command();
    match handle(ctx, request) {
        Ok(response) => response,
        Err(AppError::NotFound(_)) => Response::error("not found"),
        Err(e) => {
            tracing::warn!(command, error = %e, "Command failed");
            Response::error(e.to_string())
        }
    }
}

fn handle(ctx: &DaemonContext, request: Request) -> AppResult<Response> {
    let engine = &ctx.engine;

    let response = match request {
        Request::Store {
            prompt,
            response,
            state,
        } => {
            let id = engine.store(&prompt, &response, state.as_ref())?;
            Response::ok().with("id", id)?
        }
        Request::Search { query, limit } => {
            Response::ok().with("results", engine.search(&query, limit)?)?
        }
        Request::Recent {
            limit,
            session_only,
        } => {
            let session = session_only.then(|| engine.session().id());
            Response::ok().with("conversations", engine.recent(limit, session)?)?
        }
        Request::Recall { id } => match engine.recall(id)? {
            Some(turn) => Response::ok().with("conversation", turn)?,
            None => Response::error("not found"),
        },
        Request::SearchState {
            state,
            limit,
            min_quality,
        } => Response::ok().with(
            "results",
            engine.search_by_state(&state, limit, min_quality)?,
        )?,
        Request::Candidates { limit } => {
            Response::ok().with("candidates", engine.find_candidates(limit)?)?
        }
        Request::Graduate {
            id,
            shard_path,
            reason,
            priority,
        } => {
            let shard_path = match shard_path {
                Some(path) => path,
                None => {
                    let turn = engine
                        .get_turn(id)?
                        .ok_or_else(|| AppError::not_found(format!("Turn not found: {}", id)))?;
                    ctx.exporter.write_artifact(&turn)?.to_string_lossy().into_owned()
                }
            };
            match engine.graduate(id, &shard_path, &reason, priority)? {
                GraduationOutcome::Graduated(shard_id) => Response::ok()
                    .with("shard_id", shard_id)?
                    .with("shard_path", shard_path)?,
                GraduationOutcome::AlreadyGraduated => {
                    Response::ok().with("already_graduated", true)?
                }
            }
        }
        Request::Queue { limit } => Response::ok().with("queue", engine.training_queue(limit)?)?,
        Request::MarkTrained { id, loss } => {
            let updated = engine.mark_trained(id, loss)?;
            Response::ok().with("updated", updated)?
        }
        Request::Promote { limit } => {
            let report = ctx.exporter.promote_candidates(engine, limit)?;
            Response::ok().flatten(report)?
        }
        Request::Forget { id } => match engine.forget(id)? {
            ForgetOutcome::Forgotten => Response::ok().with("forgotten", id)?,
            ForgetOutcome::NotFound => Response::error("not found"),
            ForgetOutcome::Graduated => Response::error(format!(
                "turn {} has graduated and cannot be forgotten",
                id
            )),
        },
        Request::Stats => Response::ok().flatten(engine.stats()?)?,
        Request::Shutdown => Response::ok().with("shutdown", true)?,
        Request::Ping => Response::ok().with("pong", true)?,
    };

    Ok(response)
}

/// Response for a line that could not be decoded
pub fn decode_failure(message: String) -> Response {
    tracing::debug!(error = %message, "Rejected request line");
    Response::error(message)
}

/// Response for a handler that panicked or was cancelled
pub fn internal_failure(detail: impl std::fmt::Display) -> Response {
    tracing::error!(error = %detail, "Handler task failed");
    Response::error(format!("internal error: {}", detail))
}
