//! Redis-backed engine transport: a request stream consumed by the worker
//! fleet plus per-workflow status hashes the workers keep updated. The
//! deterministic workflow id is deduplicated with a `SET NX` registration
//! key, which is what turns a caller retry into "already started".

use super::{EngineError, StartRequest, WorkflowEngine, WorkflowHandle, WorkflowProgress, WorkflowState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use uuid::Uuid;

const REQUEST_STREAM: &str = "workflows:requests";
const SIGNAL_STREAM: &str = "workflows:signals";

/// Atomic registration for a deterministic workflow id. Returns the run id
/// that owns the registration: the caller's own id when it won (fresh start,
/// including a restart over a failed or cancelled run, whose stale status
/// hash is dropped in the same step), or the live run's id otherwise.
const REGISTER_SCRIPT: &str = r#"
local existing = redis.call('GET', KEYS[1])
if existing then
  local state = redis.call('HGET', KEYS[2], 'state')
  if state ~= 'failed' and state ~= 'cancelled' then
    return existing
  end
  redis.call('DEL', KEYS[2])
end
redis.call('SET', KEYS[1], ARGV[1])
return ARGV[1]
"#;

#[derive(Clone)]
pub struct RedisEngine {
    conn: ConnectionManager,
}

impl RedisEngine {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_tokio_connection_manager().await?;
        Ok(Self { conn })
    }

    fn run_key(workflow_id: &str) -> String {
        format!("workflow:{workflow_id}:run")
    }

    fn status_key(workflow_id: &str) -> String {
        format!("workflow:{workflow_id}:status")
    }
}

fn transport(err: redis::RedisError) -> EngineError {
    EngineError::Transport(err.to_string())
}

fn parse_timestamp(value: Option<&String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

#[async_trait]
impl WorkflowEngine for RedisEngine {
    async fn start(&self, request: StartRequest) -> Result<WorkflowHandle, EngineError> {
        let input = serde_json::to_string(&request.input)
            .map_err(|err| EngineError::InvalidRequest(err.to_string()))?;

        let mut conn = self.conn.clone();
        let run_id = Uuid::new_v4().to_string();
        let run_key = Self::run_key(&request.workflow_id);
        let status_key = Self::status_key(&request.workflow_id);

        // The script is the dedupe point: the loser of a concurrent start
        // gets the winner's run id back, while a terminal failed/cancelled
        // run is replaced so a retry enqueues fresh work.
        let owner: String = redis::Script::new(REGISTER_SCRIPT)
            .key(&run_key)
            .key(&status_key)
            .arg(&run_id)
            .invoke_async(&mut conn)
            .await
            .map_err(transport)?;

        if owner != run_id {
            return Err(EngineError::AlreadyStarted {
                workflow_id: request.workflow_id,
                run_id: owner,
            });
        }

        let now = Utc::now().to_rfc3339();
        let enqueued = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&status_key)
            .arg("state")
            .arg(WorkflowState::Running.as_str())
            .arg("step")
            .arg("queued")
            .arg("progress")
            .arg(0u8)
            .arg("started_at")
            .arg(&now)
            .arg("updated_at")
            .arg(&now)
            .ignore()
            .cmd("XADD")
            .arg(REQUEST_STREAM)
            .arg("*")
            .arg("workflow_id")
            .arg(&request.workflow_id)
            .arg("workflow_type")
            .arg(&request.workflow_type)
            .arg("run_id")
            .arg(&run_id)
            .arg("input")
            .arg(&input)
            .arg("execution_timeout_secs")
            .arg(request.timeouts.execution.as_secs())
            .arg("run_timeout_secs")
            .arg(request.timeouts.run.as_secs())
            .arg("decision_timeout_secs")
            .arg(request.timeouts.decision.as_secs())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await;

        if let Err(err) = enqueued {
            // Release the registration: a retry must not be classified as
            // AlreadyStarted against a workflow that never reached the
            // request stream.
            let rollback = redis::pipe()
                .atomic()
                .cmd("DEL")
                .arg(&run_key)
                .ignore()
                .cmd("DEL")
                .arg(&status_key)
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await;
            if let Err(rollback_err) = rollback {
                tracing::warn!(
                    workflow_id = %request.workflow_id,
                    error = %rollback_err,
                    "failed to release workflow registration after enqueue error"
                );
            }
            return Err(transport(err));
        }

        Ok(WorkflowHandle {
            workflow_id: request.workflow_id,
            run_id,
        })
    }

    async fn query(&self, workflow_id: &str) -> Result<WorkflowProgress, EngineError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(Self::status_key(workflow_id))
            .query_async(&mut conn)
            .await
            .map_err(transport)?;

        if fields.is_empty() {
            return Err(EngineError::NotFound);
        }

        let state = fields
            .get("state")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(WorkflowState::Running);
        let progress = fields
            .get("progress")
            .and_then(|raw| raw.parse::<u8>().ok())
            .unwrap_or(0)
            .min(100);

        Ok(WorkflowProgress {
            state,
            step: fields.get("step").cloned().unwrap_or_else(|| "queued".into()),
            progress,
            message: fields.get("message").cloned(),
            started_at: parse_timestamp(fields.get("started_at")),
            updated_at: parse_timestamp(fields.get("updated_at")),
        })
    }

    async fn signal(
        &self,
        workflow_id: &str,
        signal: &str,
        payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        let mut conn = self.conn.clone();

        let registered: bool = redis::cmd("EXISTS")
            .arg(Self::run_key(workflow_id))
            .query_async(&mut conn)
            .await
            .map_err(transport)?;
        if !registered {
            return Err(EngineError::NotFound);
        }

        let payload = serde_json::to_string(&payload)
            .map_err(|err| EngineError::InvalidRequest(err.to_string()))?;
        redis::cmd("XADD")
            .arg(SIGNAL_STREAM)
            .arg("*")
            .arg("workflow_id")
            .arg(workflow_id)
            .arg("signal")
            .arg(signal)
            .arg("payload")
            .arg(&payload)
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(transport)?;

        Ok(())
    }
}
