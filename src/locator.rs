//! Message lookup for a built query

use tracing::debug;

use crate::error::{Result, TriageError};
use crate::models::MessageRef;
use crate::store::MessageStore;

/// Find the messages matching `query`, keeping the store's order.
///
/// `limit` is validated at configuration time. Store failures are wrapped in
/// [`TriageError::Locator`].
pub async fn locate<S>(store: &S, query: &str, limit: u32) -> Result<Vec<MessageRef>>
where
    S: MessageStore + ?Sized,
{
    let ids = store
        .search(query, limit)
        .await
        .map_err(|e| TriageError::locator(query, e))?;

    debug!(query, found = ids.len(), "search complete");

    Ok(ids.into_iter().map(MessageRef::new).collect())
}
