//! Control surface: the command/response contract a UI speaks to the core.
//!
//! Commands are synchronous request/response pairs; asynchronous resource
//! events travel separately as [`Signal`](crate::domain::Signal)s. The wire
//! shapes use the same tagged layout as the original extension's messages,
//! so a thin frontend can serialize them directly.

use serde::{Deserialize, Serialize};

use crate::domain::{Decision, TaskId};
use crate::error::DroverError;
use crate::scheduler::{EnqueueReceipt, Scheduler, StatusReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Enqueue { urls: Vec<String> },
    Pause,
    Resume,
    Clear,
    SetConcurrency { n: usize },
    SetAutoDoneOnClose { enabled: bool },
    Status,
    Confirm { task_id: TaskId, decision: Decision },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ok,
    Enqueued { accepted: usize, rejected: usize },
    Concurrency { effective: usize },
    Status(StatusReport),
}

impl Scheduler {
    /// Execute one control-surface command.
    pub async fn handle_command(&self, command: Command) -> Result<Response, DroverError> {
        match command {
            Command::Enqueue { urls } => {
                let EnqueueReceipt { accepted, rejected } = self.enqueue(&urls).await?;
                Ok(Response::Enqueued { accepted, rejected })
            }
            Command::Pause => {
                self.pause().await?;
                Ok(Response::Ok)
            }
            Command::Resume => {
                self.resume().await?;
                Ok(Response::Ok)
            }
            Command::Clear => {
                self.clear().await?;
                Ok(Response::Ok)
            }
            Command::SetConcurrency { n } => {
                let effective = self.set_concurrency(n).await?;
                Ok(Response::Concurrency { effective })
            }
            Command::SetAutoDoneOnClose { enabled } => {
                self.set_auto_done_on_close(enabled).await?;
                Ok(Response::Ok)
            }
            Command::Status => Ok(Response::Status(self.status().await)),
            Command::Confirm { task_id, decision } => {
                self.confirm(task_id, decision).await?;
                Ok(Response::Ok)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use url::Url;

    use super::*;
    use crate::config::SchedulerConfig;
    use crate::domain::HandleId;
    use crate::impls::InMemoryStateStore;
    use crate::ports::{FixedClock, ResourceLauncher};

    struct NullLauncher;

    #[async_trait]
    impl ResourceLauncher for NullLauncher {
        async fn open(&self, _url: &Url) -> Result<HandleId, DroverError> {
            Ok(HandleId::new(1))
        }

        async fn close(&self, _handle: HandleId) -> Result<(), DroverError> {
            Ok(())
        }

        async fn is_live(&self, _handle: HandleId) -> bool {
            false
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(
            Arc::new(NullLauncher),
            Arc::new(InMemoryStateStore::new()),
            Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            )),
            SchedulerConfig::default(),
        )
    }

    #[test]
    fn commands_use_the_extension_wire_shape() {
        let json = serde_json::to_string(&Command::Enqueue {
            urls: vec!["https://a".into()],
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"ENQUEUE","urls":["https://a"]}"#);

        let parsed: Command = serde_json::from_str(r#"{"type":"SET_CONCURRENCY","n":3}"#).unwrap();
        assert_eq!(parsed, Command::SetConcurrency { n: 3 });

        let parsed: Command =
            serde_json::from_str(r#"{"type":"CONFIRM","task_id":4,"decision":"reopen"}"#).unwrap();
        assert_eq!(
            parsed,
            Command::Confirm {
                task_id: TaskId::new(4),
                decision: Decision::Reopen,
            }
        );
    }

    #[tokio::test]
    async fn enqueue_command_reports_the_receipt() {
        let scheduler = scheduler();
        let response = scheduler
            .handle_command(Command::Enqueue {
                urls: vec!["https://a".into(), "nope".into()],
            })
            .await
            .unwrap();
        assert_eq!(
            response,
            Response::Enqueued {
                accepted: 1,
                rejected: 1,
            }
        );
    }

    #[tokio::test]
    async fn status_command_reflects_state() {
        let scheduler = scheduler();
        scheduler
            .handle_command(Command::Pause)
            .await
            .unwrap();

        let Response::Status(status) = scheduler
            .handle_command(Command::Status)
            .await
            .unwrap()
        else {
            panic!("expected status response");
        };
        assert!(status.paused);
    }

    #[tokio::test]
    async fn set_concurrency_command_returns_effective_value() {
        let scheduler = scheduler();
        let response = scheduler
            .handle_command(Command::SetConcurrency { n: 50 })
            .await
            .unwrap();
        assert_eq!(response, Response::Concurrency { effective: 8 });
    }
}
