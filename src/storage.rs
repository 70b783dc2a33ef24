use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::Mutex;

pub type SharedSubscriptions = Arc<Mutex<Subscriptions>>;

/// Normalized form used both for storage and for matching.
fn normalize(street: &str) -> String {
    street.trim().to_lowercase()
}

/// The full subscriber → watched-streets mapping, backed by a single file.
///
/// Nothing here saves automatically: callers decide which mutations are
/// worth persisting and call [`Subscriptions::save`] afterwards.
pub struct Subscriptions {
    path: PathBuf,
    map: BTreeMap<ChatId, BTreeSet<String>>,
}

impl Subscriptions {
    /// Reads the subscription file. A missing file means a first run and
    /// yields an empty mapping; any other failure is logged and likewise
    /// falls back to empty rather than aborting the process.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let map = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Vec<(ChatId, Vec<String>)>>(&data) {
                Ok(pairs) => pairs
                    .into_iter()
                    .map(|(chat_id, streets)| (chat_id, streets.into_iter().collect()))
                    .collect(),
                Err(e) => {
                    log::error!("Cannot parse subscription file {}: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!(
                    "Subscription file {} not found, starting empty",
                    path.display()
                );
                BTreeMap::new()
            }
            Err(e) => {
                log::error!("Cannot read subscription file {}: {e}", path.display());
                BTreeMap::new()
            }
        };

        log::info!("Loaded subscriptions of {} chats", map.len());

        Self { path, map }
    }

    /// Writes the whole mapping back to the file, last successful save wins.
    /// Failure is logged; the in-memory state stays authoritative until the
    /// next attempt.
    pub fn save(&self) {
        let pairs: Vec<(ChatId, Vec<String>)> = self
            .map
            .iter()
            .map(|(chat_id, streets)| (*chat_id, streets.iter().cloned().collect()))
            .collect();

        let data = match serde_json::to_string_pretty(&pairs) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Cannot serialize subscriptions: {e}");
                return;
            }
        };

        match std::fs::write(&self.path, data) {
            Ok(()) => log::debug!("Saved subscriptions of {} chats", self.map.len()),
            Err(e) => {
                log::error!("Cannot write subscription file {}: {e}", self.path.display())
            }
        }
    }

    /// Creates the chat's entry if needed. Re-adding a street is a no-op.
    pub fn add_street(&mut self, chat_id: ChatId, street: &str) {
        self.map
            .entry(chat_id)
            .or_default()
            .insert(normalize(street));
    }

    /// Returns whether the street was actually present, so the caller can
    /// word its reply accurately.
    pub fn remove_street(&mut self, chat_id: ChatId, street: &str) -> bool {
        match self.map.get_mut(&chat_id) {
            Some(streets) => streets.remove(&normalize(street)),
            None => false,
        }
    }

    /// Drops the chat and all its streets. Unknown chats are a no-op.
    pub fn remove_subscriber(&mut self, chat_id: ChatId) {
        self.map.remove(&chat_id);
    }

    pub fn streets_for(&self, chat_id: ChatId) -> Vec<String> {
        match self.map.get(&chat_id) {
            Some(streets) => streets.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Read view for the match engine. Mutation goes through the methods
    /// above only.
    pub fn all(&self) -> &BTreeMap<ChatId, BTreeSet<String>> {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_store() -> (tempfile::TempDir, Subscriptions) {
        let dir = tempfile::tempdir().unwrap();
        let store = Subscriptions::load(dir.path().join("subs.json"));
        (dir, store)
    }

    #[test]
    fn load_missing_file_starts_empty() {
        let (_dir, store) = empty_store();
        assert!(store.all().is_empty());
    }

    #[test]
    fn load_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.json");
        std::fs::write(&path, "{ not json at all").unwrap();

        let store = Subscriptions::load(&path);
        assert!(store.all().is_empty());
    }

    #[test]
    fn add_street_is_idempotent_and_case_folded() {
        let (_dir, mut store) = empty_store();
        let chat = ChatId(1);

        store.add_street(chat, "  Велика Перспективна ");
        store.add_street(chat, "велика перспективна");
        store.add_street(chat, "ВЕЛИКА ПЕРСПЕКТИВНА");

        assert_eq!(store.streets_for(chat), vec!["велика перспективна"]);
    }

    #[test]
    fn remove_street_reports_whether_it_was_present() {
        let (_dir, mut store) = empty_store();
        let chat = ChatId(1);

        assert!(!store.remove_street(chat, "шевченка"));

        store.add_street(chat, "Шевченка");
        assert!(store.remove_street(chat, " ШЕВЧЕНКА "));
        assert!(!store.remove_street(chat, "шевченка"));
    }

    #[test]
    fn removing_last_street_keeps_the_subscriber_entry() {
        let (_dir, mut store) = empty_store();
        let chat = ChatId(1);

        store.add_street(chat, "франка");
        assert!(store.remove_street(chat, "франка"));

        assert!(store.streets_for(chat).is_empty());
        assert!(store.all().contains_key(&chat));
    }

    #[test]
    fn remove_subscriber_is_idempotent() {
        let (_dir, mut store) = empty_store();
        let chat = ChatId(7);

        store.add_street(chat, "гоголя");
        store.remove_subscriber(chat);
        store.remove_subscriber(chat);

        assert!(store.streets_for(chat).is_empty());
        assert!(!store.all().contains_key(&chat));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.json");

        let mut store = Subscriptions::load(&path);
        store.add_street(ChatId(1), "Шевченка");
        store.add_street(ChatId(1), "Франка");
        store.add_street(ChatId(2), "Гоголя");
        store.save();

        let reloaded = Subscriptions::load(&path);
        assert_eq!(reloaded.all(), store.all());
        assert_eq!(reloaded.streets_for(ChatId(1)), vec!["франка", "шевченка"]);
    }
}
