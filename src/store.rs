//! Message store capability consumed by the engine

use async_trait::async_trait;

use crate::error::Result;

/// Largest per-rule search limit accepted by the store
pub const MAX_SEARCH_LIMIT: u32 = 500;

/// The three store operations the engine relies on.
///
/// Implementations own transport concerns (auth, retries, quota); the engine
/// only surfaces their failures.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Message ids matching `query`, in store order, at most `limit` of them
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<String>>;

    /// Short human-readable preview of a message
    async fn fetch_snippet(&self, id: &str) -> Result<String>;

    /// Add and remove labels (by name) on all `ids` in one call and return
    /// how many messages were changed.
    /// Either every message receives the change or the call fails.
    async fn batch_mutate(&self, ids: &[String], add: &[String], remove: &[String]) -> Result<usize>;
}
