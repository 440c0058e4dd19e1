//! Gmail search expression construction for a rule's matcher

use crate::models::Matcher;

/// Build the search query for a matcher.
///
/// Label matchers are scoped to the inbox and to messages older than
/// `age_threshold`; query matchers are passed through space-joined, so the
/// rule author decides whether to add scope terms.
pub fn build_query(matcher: &Matcher, age_threshold: &str) -> String {
    match matcher {
        Matcher::ByLabels(labels) => {
            let terms: Vec<String> = labels.iter().map(|label| label_term(label)).collect();
            let labels = if terms.len() == 1 {
                terms[0].clone()
            } else {
                format!("({})", terms.join(" OR "))
            };
            format!("in:inbox {} older_than:{}", labels, age_threshold)
        }
        Matcher::ByQuery(fragments) => fragments.join(" "),
    }
}

/// `label:"name"` with embedded quotes escaped
fn label_term(label: &str) -> String {
    format!("label:\"{}\"", label.replace('"', "\\\""))
}
