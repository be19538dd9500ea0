//! Translation of realtime push messages into store writes.

use crate::error::FlowError;
use crate::store::ExecutionStore;
use crate::types::{ExecutionStatus, ExecutionUpdate};
use serde::{Deserialize, Deserializer};

/// One push message; every field is optional and absent means unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushMessage {
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    status: Option<ExecutionStatus>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    steps_executed: Option<u32>,
    #[serde(default)]
    total_steps: Option<u32>,
    /// `null` clears the step, absence leaves it alone
    #[serde(default, deserialize_with = "present")]
    current_step: Option<Option<String>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn error_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// What applying a message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageOutcome {
    /// The store accepted at least one write
    pub applied: bool,
    /// Terminal status carried by the message, if any
    pub terminal: Option<ExecutionStatus>,
}

impl MessageOutcome {
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}

/// Parse `text` and fold it into the record `execution_id`.
///
/// Non-status fields and non-terminal statuses are merged with
/// [`ExecutionStore::update`]. A terminal status first merges the other
/// fields and then completes the record. Malformed messages return
/// `FlowError::ParseError` and leave the store untouched.
pub fn apply_message(
    store: &ExecutionStore,
    execution_id: &str,
    text: &str,
) -> Result<MessageOutcome, FlowError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| FlowError::ParseError(format!("realtime message is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(FlowError::ParseError(format!(
            "realtime message must be a JSON object, got: {value}"
        )));
    }
    let msg: PushMessage = serde_json::from_value(value)
        .map_err(|e| FlowError::ParseError(format!("invalid realtime message: {e}")))?;

    let terminal = msg.status.filter(|s| s.is_terminal());
    let error = msg.error.and_then(error_text);
    let update = ExecutionUpdate {
        workflow_id: msg.workflow_id,
        status: msg.status.filter(|s| !s.is_terminal()),
        progress: msg.progress,
        steps_executed: msg.steps_executed,
        total_steps: msg.total_steps,
        current_step: msg.current_step,
        error: error.clone(),
        result: msg.result.clone(),
    };

    let mut applied = false;
    if !update.is_empty() {
        applied |= store.update(execution_id, update);
    }
    if let Some(status) = terminal {
        applied |= store.complete(execution_id, status, msg.result, error);
    }

    Ok(MessageOutcome { applied, terminal })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionRecord;
    use serde_json::json;

    fn store_with(id: &str) -> ExecutionStore {
        let store = ExecutionStore::new();
        store.upsert(ExecutionRecord::new(id, ExecutionStatus::Pending));
        store
    }

    #[test]
    fn running_progress_then_completed() {
        let store = store_with("e1");
        let r1 = apply_message(&store, "e1", r#"{"status":"running","progress":10}"#).unwrap();
        let r2 = apply_message(&store, "e1", r#"{"progress":50}"#).unwrap();
        let r3 =
            apply_message(&store, "e1", r#"{"status":"completed","result":{"ok":true}}"#).unwrap();

        assert!(!r1.is_terminal() && !r2.is_terminal());
        assert_eq!(r3.terminal, Some(ExecutionStatus::Completed));

        let rec = store.get("e1").unwrap();
        assert_eq!(rec.status, ExecutionStatus::Completed);
        assert_eq!(rec.progress, Some(50.0));
        assert_eq!(rec.result, Some(json!({"ok": true})));
        assert!(rec.completed_at.is_some());
    }

    #[test]
    fn failed_message_merges_fields_before_completing() {
        let store = store_with("e1");
        apply_message(
            &store,
            "e1",
            r#"{"status":"failed","stepsExecuted":3,"error":{"code":"E_STEP"}}"#,
        )
        .unwrap();
        let rec = store.get("e1").unwrap();
        assert_eq!(rec.status, ExecutionStatus::Failed);
        assert_eq!(rec.steps_executed, Some(3));
        assert_eq!(rec.error.as_deref(), Some(r#"{"code":"E_STEP"}"#));
    }

    #[test]
    fn null_current_step_clears_absent_keeps() {
        let store = store_with("e1");
        apply_message(&store, "e1", r#"{"currentStep":"fetch"}"#).unwrap();
        apply_message(&store, "e1", r#"{"progress":20}"#).unwrap();
        assert_eq!(store.get("e1").unwrap().current_step.as_deref(), Some("fetch"));
        apply_message(&store, "e1", r#"{"currentStep":null}"#).unwrap();
        assert_eq!(store.get("e1").unwrap().current_step, None);
    }

    #[test]
    fn malformed_messages_leave_store_untouched() {
        let store = store_with("e1");
        let before = store.get("e1").unwrap();
        for bad in ["not json", "[1,2]", r#"{"status":"exploded"}"#, r#"{"progress":"x"}"#] {
            let err = apply_message(&store, "e1", bad).unwrap_err();
            assert!(matches!(err, FlowError::ParseError(_)), "{bad}: {err:?}");
        }
        assert_eq!(store.get("e1").unwrap(), before);
    }

    #[test]
    fn messages_after_terminal_are_dropped() {
        let store = store_with("e1");
        apply_message(&store, "e1", r#"{"status":"stopped"}"#).unwrap();
        let late = apply_message(&store, "e1", r#"{"progress":99}"#).unwrap();
        assert!(!late.applied);
        assert_eq!(store.get("e1").unwrap().progress, None);
    }

    #[test]
    fn unknown_execution_is_not_created() {
        let store = ExecutionStore::new();
        let out = apply_message(&store, "ghost", r#"{"status":"completed"}"#).unwrap();
        assert!(!out.applied);
        assert!(out.is_terminal());
        assert!(store.is_empty());
    }
}
