//! Bulk action types, precondition checks and result aggregation.
//!
//! The core crate has no I/O: applying an action is the data source's job.
//! This module only decides whether a dispatch may proceed and folds the
//! per-id outcomes into a [`BulkResult`].

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{CoreError, CoreResult};
use crate::types::RecordId;

/// Reason recorded for ids the handler did not report on.
pub const NO_OUTCOME_REASON: &str = "no outcome reported";

// ---------------------------------------------------------------------------
// Action definition
// ---------------------------------------------------------------------------

/// A named operation a view exposes for selected records
/// (approve, reject, delete, set commission rate...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BulkActionSpec {
    /// Machine name passed to the data source.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// Human-readable label, also used in the confirmation prompt.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl BulkActionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            requires_confirmation: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Text shown by the confirmation collaborator.
    pub fn confirmation_prompt(&self, count: usize) -> String {
        let noun = if count == 1 { "record" } else { "records" };
        format!("{} {count} selected {noun}?", self.display_name())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of applying an action to one id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BulkOutcome {
    Succeeded,
    Failed(String),
}

impl BulkOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// One itemized failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: RecordId,
    pub reason: String,
}

/// Aggregated outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub action: String,
    pub succeeded_count: usize,
    pub failed_count: usize,
    /// Ids that succeeded; these are removed from the selection.
    pub succeeded: BTreeSet<RecordId>,
    /// Itemized failures, ordered by id. These stay selected for retry.
    pub failures: Vec<BulkFailure>,
}

impl BulkResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed_count == 0
    }

    pub fn failed_ids(&self) -> BTreeSet<RecordId> {
        self.failures.iter().map(|f| f.id.clone()).collect()
    }

    /// One-line notice for the whole batch.
    pub fn summary(&self) -> String {
        if self.failed_count == 0 {
            format!("{}: {} succeeded", self.action, self.succeeded_count)
        } else {
            format!(
                "{}: {} succeeded, {} failed",
                self.action, self.succeeded_count, self.failed_count
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// Check dispatch preconditions: an action must be chosen and at least one
/// id selected.
pub fn validate_dispatch(action: Option<&BulkActionSpec>, ids: &BTreeSet<RecordId>) -> CoreResult<()> {
    if action.is_none() {
        return Err(CoreError::NoActionSelected);
    }
    if ids.is_empty() {
        return Err(CoreError::EmptySelection);
    }
    Ok(())
}

/// Fold per-id outcomes into a [`BulkResult`].
///
/// Only ids that were requested are counted. Requested ids without an
/// outcome count as failures.
pub fn aggregate(
    action: &str,
    requested: &BTreeSet<RecordId>,
    outcomes: &HashMap<RecordId, BulkOutcome>,
) -> BulkResult {
    let mut succeeded = BTreeSet::new();
    let mut failures = Vec::new();

    for id in requested {
        match outcomes.get(id) {
            Some(BulkOutcome::Succeeded) => {
                succeeded.insert(id.clone());
            }
            Some(BulkOutcome::Failed(reason)) => failures.push(BulkFailure {
                id: id.clone(),
                reason: reason.clone(),
            }),
            None => failures.push(BulkFailure {
                id: id.clone(),
                reason: NO_OUTCOME_REASON.to_string(),
            }),
        }
    }

    BulkResult {
        action: action.to_string(),
        succeeded_count: succeeded.len(),
        failed_count: failures.len(),
        succeeded,
        failures,
    }
}

/// Itemize a whole-call rejection as a failure for every requested id.
pub fn reject_all(action: &str, requested: &BTreeSet<RecordId>, reason: &str) -> BulkResult {
    let outcomes = requested
        .iter()
        .map(|id| (id.clone(), BulkOutcome::failed(reason)))
        .collect();
    aggregate(action, requested, &outcomes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
