//! Bulk action dispatcher.
//!
//! Validates a dispatch, asks for confirmation when the action requires it,
//! applies the action through the data source in a single call and folds
//! the per-id outcomes into a [`BulkResult`]. Ids being processed are
//! tracked so that a second dispatch touching any of them is rejected with
//! [`ConsoleError::OperationInProgress`] while the first is outstanding.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use marketdesk_core::bulk::{aggregate, reject_all, validate_dispatch, BulkActionSpec, BulkResult};
use marketdesk_core::error::CoreError;
use marketdesk_core::types::RecordId;

use crate::confirm::Confirmer;
use crate::error::{ConsoleError, ConsoleResult};
use crate::source::DataSource;

/// What happened to a dispatch that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The operator declined the confirmation prompt. Nothing was applied.
    Declined,
    /// The action ran; per-id results inside.
    Completed(BulkResult),
}

impl DispatchOutcome {
    pub fn result(&self) -> Option<&BulkResult> {
        match self {
            DispatchOutcome::Declined => None,
            DispatchOutcome::Completed(result) => Some(result),
        }
    }
}

/// Applies bulk actions against one data source.
///
/// Share one dispatcher (behind an `Arc`) between every view of the same
/// source so the in-flight guard covers all of them.
pub struct BulkDispatcher {
    source: Arc<dyn DataSource>,
    in_flight: Mutex<BTreeSet<RecordId>>,
}

impl BulkDispatcher {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            in_flight: Mutex::new(BTreeSet::new()),
        }
    }

    /// Ids currently being processed by some dispatch.
    pub fn in_flight(&self) -> BTreeSet<RecordId> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `action` against `ids`.
    ///
    /// Fails with `NoActionSelected` / `EmptySelection` before anything
    /// else, then with `OperationInProgress` if any id is already in
    /// flight. A whole-call rejection from the source is not an error: it
    /// is itemized as a failure for every requested id.
    pub async fn dispatch(
        &self,
        action: Option<&BulkActionSpec>,
        ids: &BTreeSet<RecordId>,
        confirmer: &dyn Confirmer,
    ) -> ConsoleResult<DispatchOutcome> {
        validate_dispatch(action, ids)?;
        let action = action.ok_or(CoreError::NoActionSelected)?;

        let _guard = self.claim(ids)?;

        if action.requires_confirmation {
            let prompt = action.confirmation_prompt(ids.len());
            if !confirmer.confirm(&prompt).await {
                tracing::info!(action = %action.name, count = ids.len(), "Bulk action declined");
                return Ok(DispatchOutcome::Declined);
            }
        }

        tracing::info!(action = %action.name, count = ids.len(), "Dispatching bulk action");

        let result = match self.source.apply_action(&action.name, ids).await {
            Ok(outcomes) => aggregate(&action.name, ids, &outcomes),
            Err(e) => {
                tracing::error!(action = %action.name, error = %e, "Bulk action rejected by source");
                reject_all(&action.name, ids, &e.to_string())
            }
        };

        if result.is_complete_success() {
            tracing::info!(
                action = %result.action,
                succeeded = result.succeeded_count,
                "Bulk action completed",
            );
        } else {
            tracing::warn!(
                action = %result.action,
                succeeded = result.succeeded_count,
                failed = result.failed_count,
                "Bulk action partially failed",
            );
        }

        Ok(DispatchOutcome::Completed(result))
    }

    fn claim(&self, ids: &BTreeSet<RecordId>) -> ConsoleResult<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let overlapping = ids.intersection(&in_flight).count();
        if overlapping > 0 {
            tracing::warn!(overlapping, requested = ids.len(), "Rejected overlapping bulk dispatch");
            return Err(ConsoleError::OperationInProgress { overlapping });
        }
        in_flight.extend(ids.iter().cloned());
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            ids: ids.clone(),
        })
    }
}

/// Releases claimed ids when the dispatch finishes, however it finishes.
#[derive(Debug)]
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<BTreeSet<RecordId>>,
    ids: BTreeSet<RecordId>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            in_flight.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AutoConfirm;
    use crate::source::InMemorySource;
    use assert_matches::assert_matches;
    use marketdesk_core::bulk::BulkOutcome;
    use serde_json::json;

    fn ids(values: &[i64]) -> BTreeSet<RecordId> {
        values.iter().copied().map(RecordId::Int).collect()
    }

    fn dispatcher() -> (Arc<InMemorySource>, BulkDispatcher) {
        let source = Arc::new(
            InMemorySource::from_json(json!([{"id": 1}, {"id": 2}, {"id": 3}]))
                .unwrap()
                .with_update("approve", |record| {
                    if record.id == RecordId::Int(3) {
                        BulkOutcome::failed("stock locked")
                    } else {
                        BulkOutcome::Succeeded
                    }
                })
                .with_removal("delete"),
        );
        let dispatcher = BulkDispatcher::new(source.clone());
        (source, dispatcher)
    }

    #[tokio::test]
    async fn partial_failure_is_data() {
        let (_, dispatcher) = dispatcher();
        let action = BulkActionSpec::new("approve");
        let outcome = dispatcher
            .dispatch(Some(&action), &ids(&[1, 2, 3]), &AutoConfirm::ACCEPT)
            .await
            .unwrap();

        let result = outcome.result().unwrap();
        assert_eq!(result.succeeded, ids(&[1, 2]));
        assert_eq!(result.failed_ids(), ids(&[3]));
        assert!(dispatcher.in_flight().is_empty());
    }

    #[tokio::test]
    async fn declined_confirmation_applies_nothing() {
        let (source, dispatcher) = dispatcher();
        let action = BulkActionSpec::new("delete").confirmed();
        let outcome = dispatcher
            .dispatch(Some(&action), &ids(&[1]), &AutoConfirm::DECLINE)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Declined);
        assert_eq!(source.len().await, 3);
        assert!(dispatcher.in_flight().is_empty());
    }

    #[tokio::test]
    async fn whole_call_rejection_is_itemized() {
        let (source, dispatcher) = dispatcher();
        source.fail_actions(Some("backend unavailable")).await;

        let action = BulkActionSpec::new("approve");
        let outcome = dispatcher
            .dispatch(Some(&action), &ids(&[1, 2]), &AutoConfirm::ACCEPT)
            .await
            .unwrap();

        let result = outcome.result().unwrap();
        assert_eq!(result.failed_count, 2);
        assert!(result.failures.iter().all(|f| f.reason.contains("backend unavailable")));
    }

    #[tokio::test]
    async fn preconditions_checked_before_source() {
        let (_, dispatcher) = dispatcher();
        assert_matches!(
            dispatcher.dispatch(None, &ids(&[1]), &AutoConfirm::ACCEPT).await,
            Err(ConsoleError::Core(CoreError::NoActionSelected))
        );
        let action = BulkActionSpec::new("approve");
        assert_matches!(
            dispatcher.dispatch(Some(&action), &BTreeSet::new(), &AutoConfirm::ACCEPT).await,
            Err(ConsoleError::Core(CoreError::EmptySelection))
        );
    }

    #[test]
    fn overlapping_claim_rejected_until_released() {
        let (_, dispatcher) = dispatcher();
        let first = dispatcher.claim(&ids(&[1, 2])).unwrap();

        assert_matches!(
            dispatcher.claim(&ids(&[2, 3])),
            Err(ConsoleError::OperationInProgress { overlapping: 1 })
        );
        assert!(dispatcher.claim(&ids(&[3])).is_ok());

        drop(first);
        assert!(dispatcher.claim(&ids(&[2, 3])).is_ok());
    }
}
