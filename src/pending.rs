use std::collections::HashSet;
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::Mutex;

pub type SharedPending = Arc<Mutex<PendingAdds>>;

/// Chats whose next text message will be taken as a street name.
///
/// At most one flag per chat, no timeout. Process-lifetime only; a restart
/// forgets every half-finished dialog.
#[derive(Default)]
pub struct PendingAdds(HashSet<ChatId>);

impl PendingAdds {
    pub fn set(&mut self, chat_id: ChatId) {
        self.0.insert(chat_id);
    }

    pub fn has(&self, chat_id: ChatId) -> bool {
        self.0.contains(&chat_id)
    }

    pub fn clear(&mut self, chat_id: ChatId) {
        self.0.remove(&chat_id);
    }
}
