//! Deploy orchestration: package a translation, submit it, poll until it settles.
//!
//! The run is an explicit state machine:
//!
//! ```text
//! Building -> Submitted -> Polling -> Succeeded | Failed | TimedOut
//!     \            \
//!      +-> Failed   +-> Failed
//! ```
//!
//! - `Building`: the payload becomes a stored archive (see [`crate::translation`]).
//! - `Submitted`: the base64 archive goes out through the metadata `deploy` call; a missing job id
//!   or a fault moves straight to `Failed`.
//! - `Polling`: waits one interval, then checks status, up to [`PollPolicy::max_attempts`] times.
//!   Attempts never overlap. `done && success` is `Succeeded`, `done && !success` is `Failed` with
//!   the resolved error message, an exhausted budget is `TimedOut`. A status call that fails at
//!   transport level is not retried.
//!
//! Rollback is requested from the platform as a deploy option, so nothing is undone locally.
//! Abandoning the returned future does not cancel the remote job.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::client::OrgClient;
use crate::contract::{Sleeper, Transport};
use crate::error::BridgeError;
use crate::translation::TranslationPayload;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployState {
    Building,
    Submitted,
    Polling,
    Succeeded,
    Failed(BridgeError),
    TimedOut,
}

impl DeployState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeployState::Succeeded | DeployState::Failed(_) | DeployState::TimedOut
        )
    }
}

/// `{success: true}` or `{success: false, error: "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where a run ended and how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub job_id: Option<String>,
    /// Status checks performed.
    pub polls: u32,
    pub state: DeployState,
}

impl DeployReport {
    fn new() -> Self {
        Self {
            job_id: None,
            polls: 0,
            state: DeployState::Building,
        }
    }

    fn advance(&mut self, next: DeployState) {
        debug_assert!(!self.state.is_terminal(), "terminal deploy states never change");
        info!(
            job_id = self.job_id.as_deref().unwrap_or("-"),
            from = ?self.state,
            to = ?next,
            polls = self.polls,
            "[DEPLOY] State transition"
        );
        self.state = next;
    }

    fn finish(mut self, terminal: DeployState) -> Self {
        self.advance(terminal);
        self
    }

    pub fn into_result(self) -> Result<(), BridgeError> {
        match self.state {
            DeployState::Succeeded => Ok(()),
            DeployState::Failed(e) => Err(e),
            DeployState::TimedOut => Err(BridgeError::Timeout {
                attempts: self.polls,
            }),
            DeployState::Building | DeployState::Submitted | DeployState::Polling => {
                Err(BridgeError::InvalidResponse(
                    "deploy run stopped before a terminal state".to_string(),
                ))
            }
        }
    }

    pub fn outcome(&self) -> DeployOutcome {
        match self.clone().into_result() {
            Ok(()) => DeployOutcome {
                success: true,
                error: None,
            },
            Err(e) => DeployOutcome {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}

pub struct DeployOrchestrator<'a, T, S> {
    client: OrgClient<'a, T>,
    sleeper: &'a S,
    policy: PollPolicy,
}

impl<'a, T, S> DeployOrchestrator<'a, T, S>
where
    T: Transport,
    S: Sleeper,
{
    pub fn new(client: OrgClient<'a, T>, sleeper: &'a S) -> Self {
        Self {
            client,
            sleeper,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs one payload to a terminal state.
    pub async fn run(&self, payload: &TranslationPayload) -> DeployReport {
        let mut report = DeployReport::new();
        info!(
            object = %payload.object_name,
            field = %payload.field_api_name,
            locale = %payload.locale,
            "[DEPLOY] Building translation package"
        );

        let api_version = &self.client.connection().api_version;
        let archive = match payload.archive_base64(api_version) {
            Ok(archive) => archive,
            Err(e) => {
                error!(error = %e, "[DEPLOY][ERROR] Could not build archive");
                return report.finish(DeployState::Failed(e));
            }
        };

        report.advance(DeployState::Submitted);
        let job_id = match self.client.submit_deploy(&archive).await {
            Ok(job_id) => job_id,
            Err(e) => {
                error!(error = %e, "[DEPLOY][ERROR] Deploy submit failed");
                return report.finish(DeployState::Failed(e));
            }
        };
        report.job_id = Some(job_id.clone());

        report.advance(DeployState::Polling);
        while report.polls < self.policy.max_attempts {
            self.sleeper.sleep(self.policy.interval).await;
            report.polls += 1;

            let job = match self.client.check_deploy_status(&job_id).await {
                Ok(job) => job,
                Err(e) => {
                    error!(job_id = %job_id, attempt = report.polls, error = %e, "[DEPLOY][ERROR] Status check failed");
                    return report.finish(DeployState::Failed(e));
                }
            };
            debug!(
                job_id = %job_id,
                attempt = report.polls,
                done = job.done,
                success = job.success,
                status = %job.status_label,
                "[DEPLOY] Status checked"
            );

            if job.done {
                if job.success {
                    return report.finish(DeployState::Succeeded);
                }
                let failure = job.failure();
                error!(job_id = %job_id, error = %failure, source = ?job.error_source, "[DEPLOY][ERROR] Deploy finished unsuccessfully");
                return report.finish(DeployState::Failed(failure));
            }
        }

        error!(job_id = %job_id, attempts = report.polls, "[DEPLOY][ERROR] Deploy did not finish in time");
        report.finish(DeployState::TimedOut)
    }
}
