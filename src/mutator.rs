//! Applies a label delta to located messages, or previews them in simulation

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::{Result, TriageError};
use crate::models::{LabelDelta, MessageRef};
use crate::store::MessageStore;

/// Result of applying one rule's delta
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Messages whose labels were changed; always 0 when simulating
    pub count: usize,
    /// Messages with fetched snippets; only populated when simulating
    pub previews: Vec<MessageRef>,
}

/// Apply `delta` to every message in `messages`.
///
/// Production mode issues a single batch call covering all messages.
/// Simulation mode issues no mutation and instead fetches a snippet for each
/// message, in order. A snippet that cannot be fetched leaves the preview
/// without one.
pub async fn apply<S>(
    store: &S,
    messages: Vec<MessageRef>,
    delta: &LabelDelta,
    simulate: bool,
) -> Result<MutationOutcome>
where
    S: MessageStore + ?Sized,
{
    if simulate {
        let previews = stream::iter(messages)
            .then(|mut message| async move {
                match store.fetch_snippet(&message.id).await {
                    Ok(snippet) => message.snippet = Some(snippet),
                    Err(e) => warn!("Could not fetch preview for {}: {}", message.id, e),
                }
                message
            })
            .collect::<Vec<_>>()
            .await;

        return Ok(MutationOutcome {
            count: 0,
            previews,
        });
    }

    if messages.is_empty() || delta.is_empty() {
        return Ok(MutationOutcome::default());
    }

    let ids: Vec<String> = messages.into_iter().map(|m| m.id).collect();
    let count = store
        .batch_mutate(&ids, &delta.add, &delta.remove)
        .await
        .map_err(|e| TriageError::mutation(ids.len(), e))?;

    debug!(
        count,
        add = ?delta.add,
        remove = ?delta.remove,
        "batch mutation applied"
    );

    Ok(MutationOutcome {
        count,
        previews: Vec::new(),
    })
}
