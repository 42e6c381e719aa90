use async_trait::async_trait;

/// Asks the operator to approve a destructive or wide-reaching action.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Return `true` to proceed. Declining cancels the dispatch without error.
    async fn confirm(&self, description: &str) -> bool;
}

/// Answers every prompt the same way. Useful for scripted runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm(pub bool);

impl AutoConfirm {
    pub const ACCEPT: Self = Self(true);
    pub const DECLINE: Self = Self(false);
}

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, description: &str) -> bool {
        tracing::debug!(prompt = description, answer = self.0, "Auto-answered confirmation");
        self.0
    }
}
