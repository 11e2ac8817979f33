//! User-facing notices derived from terminal operation states.
//!
//! The coordinator itself never renders anything; consumers build exactly
//! one notice per terminal transition. Success notices auto-hide quickly,
//! error notices linger, and a cancellation reads neutrally rather than as
//! an alarm.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::coordinator::{OperationState, Phase};
use crate::error::OperationError;
use crate::request::ActionKind;

/// Auto-hide delay for success notices.
pub const SUCCESS_HIDE: Duration = Duration::from_secs(4);

/// Auto-hide delay for error notices. Longer, so the user can read them.
pub const ERROR_HIDE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    /// Neutral, e.g. a cancellation.
    Info,
}

/// A transient message to show the user after an operation finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    /// Field-level messages for inline display in the originating form.
    pub field_errors: BTreeMap<String, Vec<String>>,
    pub auto_hide: Duration,
}

impl Notice {
    /// Builds the single notice for a terminal state. Returns `None` for
    /// non-terminal phases.
    pub fn from_terminal(state: &OperationState, kind: ActionKind, affected: usize) -> Option<Notice> {
        match state.phase {
            Phase::Succeeded => Some(Notice {
                kind: NoticeKind::Success,
                message: success_message(kind, affected),
                field_errors: BTreeMap::new(),
                auto_hide: SUCCESS_HIDE,
            }),
            Phase::Failed => {
                let error = state.error.as_ref()?;
                if error.is_cancelled() {
                    return Some(Notice {
                        kind: NoticeKind::Info,
                        message: "Operation cancelled".to_string(),
                        field_errors: BTreeMap::new(),
                        auto_hide: SUCCESS_HIDE,
                    });
                }
                Some(Notice {
                    kind: NoticeKind::Error,
                    message: error.to_string(),
                    field_errors: error.field_errors().cloned().unwrap_or_default(),
                    auto_hide: ERROR_HIDE,
                })
            }
            Phase::Idle | Phase::Running => None,
        }
    }
}

fn success_message(kind: ActionKind, affected: usize) -> String {
    let noun = if affected == 1 { "item" } else { "items" };
    match kind {
        ActionKind::Scan => {
            let noun = if affected == 1 { "website" } else { "websites" };
            format!("Scan finished for {} {}", affected, noun)
        }
        ActionKind::Delete => format!("Deleted {} {}", affected, noun),
        ActionKind::StatusUpdate => format!("Updated status of {} {}", affected, noun),
        ActionKind::GroupAssign => {
            let noun = if affected == 1 { "website" } else { "websites" };
            format!("Updated group for {} {}", affected, noun)
        }
        ActionKind::Schedule => {
            let noun = if affected == 1 { "website" } else { "websites" };
            format!("Scheduled scans for {} {}", affected, noun)
        }
        ActionKind::TypeUpdate => format!("Updated type of {} {}", affected, noun),
        ActionKind::CategoryUpdate => format!("Updated category of {} {}", affected, noun),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn terminal(phase: Phase, error: Option<OperationError>) -> OperationState {
        OperationState {
            phase,
            percent: if phase == Phase::Succeeded { 100 } else { 40 },
            stage: String::new(),
            error,
            result: if phase == Phase::Succeeded {
                Some(json!({}))
            } else {
                None
            },
        }
    }

    #[test]
    fn success_notice_summarizes_count() {
        let state = terminal(Phase::Succeeded, None);
        let notice = Notice::from_terminal(&state, ActionKind::Delete, 3).unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.message, "Deleted 3 items");
        assert_eq!(notice.auto_hide, SUCCESS_HIDE);
    }

    #[test]
    fn singular_forms_for_single_item() {
        let state = terminal(Phase::Succeeded, None);
        let notice = Notice::from_terminal(&state, ActionKind::Scan, 1).unwrap();
        assert_eq!(notice.message, "Scan finished for 1 website");
    }

    #[test]
    fn error_notice_lingers_and_carries_field_errors() {
        let mut field_errors = BTreeMap::new();
        field_errors.insert("status".to_string(), vec!["invalid value".to_string()]);
        let state = terminal(
            Phase::Failed,
            Some(OperationError::ServerValidation {
                field_errors: field_errors.clone(),
            }),
        );
        let notice = Notice::from_terminal(&state, ActionKind::StatusUpdate, 2).unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.field_errors, field_errors);
        assert_eq!(notice.auto_hide, ERROR_HIDE);
    }

    #[test]
    fn cancellation_is_neutral() {
        let state = terminal(Phase::Failed, Some(OperationError::Cancelled));
        let notice = Notice::from_terminal(&state, ActionKind::Scan, 5).unwrap();
        assert_eq!(notice.kind, NoticeKind::Info);
        assert_eq!(notice.message, "Operation cancelled");
    }

    #[test]
    fn no_notice_outside_terminal_phases() {
        let running = OperationState {
            phase: Phase::Running,
            percent: 30,
            stage: "Scanning".to_string(),
            error: None,
            result: None,
        };
        assert!(Notice::from_terminal(&running, ActionKind::Scan, 1).is_none());
    }
}
