//! Turns a rule's actions into the label changes to apply

use crate::models::{Actions, LabelDelta, INBOX_LABEL, TRASH_LABEL, UNREAD_LABEL};

/// Resolve `actions` into a [`LabelDelta`].
///
/// Implicit toggles come first (mark_as_read, archive, trash), then explicit
/// `add`/`remove` labels in author order. Repeated names are kept once.
/// An empty delta means the rule has nothing to do.
pub fn resolve(actions: &Actions) -> LabelDelta {
    let mut delta = LabelDelta::default();

    if actions.mark_as_read {
        push_unique(&mut delta.remove, UNREAD_LABEL);
    }
    if actions.archive {
        push_unique(&mut delta.remove, INBOX_LABEL);
    }
    if actions.trash {
        push_unique(&mut delta.add, TRASH_LABEL);
    }
    for label in &actions.add {
        push_unique(&mut delta.add, label);
    }
    for label in &actions.remove {
        push_unique(&mut delta.remove, label);
    }

    delta
}

fn push_unique(labels: &mut Vec<String>, label: &str) {
    let label = label.trim();
    if !label.is_empty() && !labels.iter().any(|l| l == label) {
        labels.push(label.to_string());
    }
}
