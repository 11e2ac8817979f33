use std::collections::BTreeMap;

use crate::request::ActionKind;
use crate::resource::ResourceType;

/// Top-level error type. All public API functions return this.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-side precondition failures raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("nothing selected: select at least one item first")]
    EmptySelection,

    #[error("action {kind} is not available for {resource}")]
    UnsupportedAction {
        resource: ResourceType,
        kind: ActionKind,
    },
}

/// Failure descriptor attached to a terminal `failed` operation state.
///
/// Every executor failure is converted into one of these at the coordinator
/// boundary; nothing propagates past it as an unhandled task error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperationError {
    /// Precondition failed before the executor was invoked.
    #[error("validation failed: {0}")]
    Validation(String),

    /// At-most-one-concurrent-operation policy rejected a second `start`.
    #[error("an operation is already in progress")]
    AlreadyRunning,

    /// Transport-level failure: no usable response received.
    #[error("network error: {0}")]
    Network(String),

    /// Server responded with a non-2xx status other than 422.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP 422: the server rejected the payload with field-level messages.
    #[error("server rejected the request ({} field(s) invalid)", .field_errors.len())]
    ServerValidation {
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// The operation was cancelled while running. Rendered neutrally in UIs.
    #[error("operation cancelled")]
    Cancelled,
}

impl OperationError {
    /// Field-level messages from a 422 response, if any.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            OperationError::ServerValidation { field_errors } => Some(field_errors),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationError::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("malformed history file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
