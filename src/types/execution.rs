//! Execution record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl ExecutionStatus {
    /// `completed`, `failed` and `stopped` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed | Self::Stopped => 2,
        }
    }

    /// Whether moving from `self` to `next` goes forward.
    ///
    /// Staying on the same non-terminal status is allowed; nothing leaves a
    /// terminal status.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            other => Err(crate::error::FlowError::ParseError(format!(
                "unknown execution status '{other}'"
            ))),
        }
    }
}

/// Live view of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    pub status: ExecutionStatus,
    /// Percentage in `0..=100`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_executed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// New record started now.
    pub fn new(id: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            id: id.into(),
            workflow_id: None,
            status,
            progress: None,
            steps_executed: None,
            total_steps: None,
            current_step: None,
            error: None,
            result: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Shallow-merge `update` into this record.
    ///
    /// Absent fields are left untouched. A status that would move backwards is
    /// ignored while the remaining fields still merge. Entering a terminal
    /// status stamps `completed_at` if it is not set yet.
    pub fn merge(&mut self, update: ExecutionUpdate) {
        let ExecutionUpdate {
            workflow_id,
            status,
            progress,
            steps_executed,
            total_steps,
            current_step,
            error,
            result,
        } = update;

        if let Some(workflow_id) = workflow_id {
            self.workflow_id = Some(workflow_id);
        }
        if let Some(progress) = progress {
            self.progress = Some(clamp_progress(progress));
        }
        if let Some(n) = steps_executed {
            self.steps_executed = Some(n);
        }
        if let Some(n) = total_steps {
            self.total_steps = Some(n);
        }
        if let Some(step) = current_step {
            self.current_step = step;
        }
        if let Some(error) = error {
            self.error = Some(error);
        }
        if let Some(result) = result {
            self.result = Some(result);
        }
        if let Some(next) = status {
            if self.status.can_transition_to(next) {
                self.status = next;
                if next.is_terminal() && self.completed_at.is_none() {
                    self.completed_at = Some(Utc::now());
                }
            } else if next != self.status {
                tracing::debug!(
                    target: "flowstream::store",
                    id = %self.id,
                    from = %self.status,
                    to = %next,
                    "ignoring backwards status transition"
                );
            }
        }
    }
}

fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Partial update for an [`ExecutionRecord`].
///
/// `None` means "unchanged". `current_step` is doubly optional so an explicit
/// `null` can clear the step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionUpdate {
    pub workflow_id: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub progress: Option<f64>,
    pub steps_executed: Option<u32>,
    pub total_steps: Option<u32>,
    pub current_step: Option<Option<String>>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl ExecutionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn steps_executed(mut self, n: u32) -> Self {
        self.steps_executed = Some(n);
        self
    }

    pub fn total_steps(mut self, n: u32) -> Self {
        self.total_steps = Some(n);
        self
    }

    pub fn current_step(mut self, step: Option<impl Into<String>>) -> Self {
        self.current_step = Some(step.map(Into::into));
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Every field the record carries, used when upserting a full record.
    ///
    /// A record cannot express "absent" for `current_step`, so a `None` step
    /// is treated as unchanged.
    pub fn from_record(record: &ExecutionRecord) -> Self {
        Self {
            workflow_id: record.workflow_id.clone(),
            status: Some(record.status),
            progress: record.progress,
            steps_executed: record.steps_executed,
            total_steps: record.total_steps,
            current_step: record.current_step.clone().map(Some),
            error: record.error.clone(),
            result: record.result.clone(),
        }
    }
}
