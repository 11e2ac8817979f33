//! Bulk action dispatch: selection + payload -> validated operation.
//!
//! The dispatcher enforces the client-side preconditions (non-empty
//! selection, action legal for the resource per the capability table),
//! builds the request, and hands it to the coordinator. Confirmation of
//! destructive actions is deliberately the caller's job so this stays
//! UI-framework-agnostic.

use std::sync::Arc;

use crate::client::OperationExecutor;
use crate::coordinator::{OperationCoordinator, OperationState, Phase};
use crate::error::{DispatchError, FleetError, OperationError};
use crate::request::{ActionPayload, OperationRequest};
use crate::resource::{self, ResourceType};
use crate::selection::SelectionSet;

/// Terminal outcome of a dispatched bulk action.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Terminal state (`Succeeded` or `Failed`); executor failures land
    /// here, not in the `Err` channel.
    pub state: OperationState,
    /// How many items the action targeted.
    pub affected: usize,
}

impl DispatchOutcome {
    pub fn succeeded(&self) -> bool {
        self.state.phase == Phase::Succeeded
    }
}

/// Dispatches bulk actions for one resource type through a shared
/// coordinator.
pub struct BulkActionDispatcher {
    resource: ResourceType,
    coordinator: Arc<OperationCoordinator>,
    executor: Arc<dyn OperationExecutor>,
}

impl BulkActionDispatcher {
    pub fn new(
        resource: ResourceType,
        coordinator: Arc<OperationCoordinator>,
        executor: Arc<dyn OperationExecutor>,
    ) -> Self {
        Self {
            resource,
            coordinator,
            executor,
        }
    }

    pub fn resource(&self) -> ResourceType {
        self.resource
    }

    pub fn coordinator(&self) -> &Arc<OperationCoordinator> {
        &self.coordinator
    }

    /// Runs `payload` against the current selection and waits for the
    /// terminal state.
    ///
    /// Precondition failures (`EmptySelection`, `UnsupportedAction`, and the
    /// coordinator's own validation) return `Err` before any network call.
    /// Once the executor is invoked, failures are reported through the
    /// outcome's terminal state instead. On success the selection is
    /// cleared.
    pub async fn dispatch(
        &self,
        payload: ActionPayload,
        selection: &mut SelectionSet,
    ) -> Result<DispatchOutcome, FleetError> {
        if selection.is_empty() {
            return Err(DispatchError::EmptySelection.into());
        }
        let kind = payload.kind();
        if !resource::supports(self.resource, kind) {
            return Err(DispatchError::UnsupportedAction {
                resource: self.resource,
                kind,
            }
            .into());
        }

        let request = OperationRequest {
            resource: self.resource,
            target_ids: selection.to_vec(),
            payload,
        };
        let affected = request.target_ids.len();
        tracing::debug!(resource = %self.resource, %kind, affected, "dispatching bulk action");

        let mut rx = self
            .coordinator
            .start(request, Arc::clone(&self.executor))?;
        let state = rx
            .wait_for(|s| s.is_terminal())
            .await
            .map(|s| s.clone())
            .map_err(|_| {
                OperationError::Validation("coordinator state channel closed".to_string())
            })?;

        if state.phase == Phase::Succeeded {
            selection.clear();
        }
        Ok(DispatchOutcome { state, affected })
    }
}
