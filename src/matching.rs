use std::collections::{BTreeMap, BTreeSet};

use teloxide::types::ChatId;

/// Which chats is this announcement relevant to?
///
/// The announcement text is lowercased once, then every subscriber's streets
/// (stored normalized) are tested for plain substring containment; the first
/// hit settles that subscriber. Substring, not word-boundary: a short street
/// token also hits inside unrelated longer words, and that stays as is.
/// Linear over subscribers and their streets, no index; the audience is a
/// handful of chats.
pub fn affected_subscribers(
    text: &str,
    subscriptions: &BTreeMap<ChatId, BTreeSet<String>>,
) -> Vec<ChatId> {
    let haystack = text.to_lowercase();

    subscriptions
        .iter()
        .filter(|(_, streets)| streets.iter().any(|street| haystack.contains(street.as_str())))
        .map(|(chat_id, _)| *chat_id)
        .collect()
}
