//! Data sources: where record snapshots come from and where bulk actions
//! are applied.
//!
//! The console only ever holds a read-only snapshot. Every change goes back
//! through [`DataSource::apply_action`], which reports an outcome per id.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use marketdesk_core::bulk::BulkOutcome;
use marketdesk_core::error::CoreError;
use marketdesk_core::record::{records_from_json, Record};
use marketdesk_core::types::RecordId;
use serde_json::Value;
use tokio::sync::RwLock;

/// Failure reported by a data source for a whole call.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Action '{0}' is not supported by this source")]
    UnsupportedAction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed source data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// External owner of the record collection.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the full current collection.
    async fn fetch_all(&self) -> Result<Vec<Record>, SourceError>;

    /// Apply `action` to `ids` and report one outcome per id. Ids missing
    /// from the returned map are treated as failures by the dispatcher.
    async fn apply_action(
        &self,
        action: &str,
        ids: &BTreeSet<RecordId>,
    ) -> Result<HashMap<RecordId, BulkOutcome>, SourceError>;
}

// ---------------------------------------------------------------------------
// InMemorySource
// ---------------------------------------------------------------------------

/// Per-record mutation run by an in-memory action.
pub type UpdateFn = Arc<dyn Fn(&mut Record) -> BulkOutcome + Send + Sync>;

#[derive(Clone)]
enum ActionHandler {
    Update(UpdateFn),
    Remove,
}

/// Record collection held in memory, with named action handlers.
///
/// Used by tests and by embedders that already hold their data. Failures
/// can be injected to exercise error paths.
#[derive(Default)]
pub struct InMemorySource {
    records: RwLock<Vec<Record>>,
    handlers: HashMap<String, ActionHandler>,
    fetch_failure: RwLock<Option<String>>,
    action_failure: RwLock<Option<String>>,
}

impl InMemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Parse a JSON array of records.
    pub fn from_json(value: Value) -> Result<Self, SourceError> {
        Ok(Self::new(records_from_json(value)?))
    }

    /// Register an action that mutates each targeted record.
    pub fn with_update<F>(mut self, action: impl Into<String>, update: F) -> Self
    where
        F: Fn(&mut Record) -> BulkOutcome + Send + Sync + 'static,
    {
        self.handlers
            .insert(action.into(), ActionHandler::Update(Arc::new(update)));
        self
    }

    /// Register an action that sets `field` to `value` (approve, reject...).
    pub fn with_field_update(self, action: impl Into<String>, field: &str, value: Value) -> Self {
        let field = field.to_string();
        self.with_update(action, move |record: &mut Record| {
            record.fields.insert(field.clone(), value.clone());
            BulkOutcome::Succeeded
        })
    }

    /// Register an action that deletes the targeted records.
    pub fn with_removal(mut self, action: impl Into<String>) -> Self {
        self.handlers.insert(action.into(), ActionHandler::Remove);
        self
    }

    /// Make every fetch fail with `reason` until cleared with `None`.
    pub async fn fail_fetches(&self, reason: Option<&str>) {
        *self.fetch_failure.write().await = reason.map(str::to_string);
    }

    /// Make every action call fail as a whole until cleared with `None`.
    pub async fn fail_actions(&self, reason: Option<&str>) {
        *self.action_failure.write().await = reason.map(str::to_string);
    }

    pub async fn insert(&self, record: Record) {
        self.records.write().await.push(record);
    }

    /// Remove a record directly, as another operator would. Returns whether
    /// it existed.
    pub async fn remove(&self, id: &RecordId) -> bool {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| &r.id != id);
        records.len() != before
    }

    pub async fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.read().await.iter().find(|r| &r.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn fetch_all(&self) -> Result<Vec<Record>, SourceError> {
        if let Some(reason) = self.fetch_failure.read().await.clone() {
            return Err(SourceError::Unavailable(reason));
        }
        Ok(self.records.read().await.clone())
    }

    async fn apply_action(
        &self,
        action: &str,
        ids: &BTreeSet<RecordId>,
    ) -> Result<HashMap<RecordId, BulkOutcome>, SourceError> {
        if let Some(reason) = self.action_failure.read().await.clone() {
            return Err(SourceError::Unavailable(reason));
        }
        let handler = self
            .handlers
            .get(action)
            .cloned()
            .ok_or_else(|| SourceError::UnsupportedAction(action.to_string()))?;

        let mut records = self.records.write().await;
        let mut outcomes = HashMap::with_capacity(ids.len());

        match handler {
            ActionHandler::Update(update) => {
                for id in ids {
                    let outcome = match records.iter_mut().find(|r| &r.id == id) {
                        Some(record) => update(record),
                        None => BulkOutcome::failed("record not found"),
                    };
                    outcomes.insert(id.clone(), outcome);
                }
            }
            ActionHandler::Remove => {
                for id in ids {
                    let outcome = if records.iter().any(|r| &r.id == id) {
                        BulkOutcome::Succeeded
                    } else {
                        BulkOutcome::failed("record not found")
                    };
                    outcomes.insert(id.clone(), outcome);
                }
                records.retain(|r| !ids.contains(&r.id));
            }
        }

        Ok(outcomes)
    }
}

// ---------------------------------------------------------------------------
// JsonFileSource
// ---------------------------------------------------------------------------

/// Read-only source backed by a JSON array on disk. Re-read on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    async fn fetch_all(&self) -> Result<Vec<Record>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let value: Value = serde_json::from_str(&raw)?;
        let records = records_from_json(value)?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "Loaded records from file");
        Ok(records)
    }

    async fn apply_action(
        &self,
        action: &str,
        _ids: &BTreeSet<RecordId>,
    ) -> Result<HashMap<RecordId, BulkOutcome>, SourceError> {
        Err(SourceError::UnsupportedAction(action.to_string()))
    }
}
