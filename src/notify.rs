use std::sync::Arc;

use futures_core::future::BoxFuture;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use url::Url;

use crate::messages;
use crate::storage::SharedSubscriptions;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The recipient can never be reached again without re-subscribing
    /// (blocked the bot, deleted the account, kicked the bot).
    #[error("recipient is permanently unreachable")]
    PermanentlyDenied,
    #[error("delivery failed: {0}")]
    Other(String),
}

impl From<RequestError> for DeliveryError {
    fn from(e: RequestError) -> Self {
        match &e {
            RequestError::Api(
                ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
                | ApiError::UserDeactivated
                | ApiError::ChatNotFound,
            ) => DeliveryError::PermanentlyDenied,
            _ => DeliveryError::Other(e.to_string()),
        }
    }
}

/// Outbound message transport. The dispatcher only cares that a delivery
/// attempt resolves to success or a classified failure, so tests can swap
/// in a scripted transport.
pub trait Outbound: Send + Sync {
    fn deliver(
        &self,
        chat_id: ChatId,
        text: String,
        link: Url,
    ) -> BoxFuture<'static, Result<(), DeliveryError>>;
}

struct TelegramSender {
    bot: crate::Bot,
}

impl Outbound for TelegramSender {
    fn deliver(
        &self,
        chat_id: ChatId,
        text: String,
        link: Url,
    ) -> BoxFuture<'static, Result<(), DeliveryError>> {
        let bot = self.bot.clone();

        Box::pin(async move {
            let keyboard = InlineKeyboardMarkup::new([[InlineKeyboardButton::url(
                messages::SOURCE_BUTTON_LABEL,
                link,
            )]]);

            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::MarkdownV2)
                .reply_markup(keyboard)
                .await
                .map(|_| ())
                .map_err(DeliveryError::from)
        })
    }
}

/// Fans announcements out to the affected chats.
#[derive(Clone)]
pub struct Notifier {
    outbound: Arc<dyn Outbound>,
    subscriptions: SharedSubscriptions,
    source_channel: String,
}

impl Notifier {
    pub fn new(bot: crate::Bot, subscriptions: SharedSubscriptions, source_channel: String) -> Self {
        Self::with_outbound(Arc::new(TelegramSender { bot }), subscriptions, source_channel)
    }

    fn with_outbound(
        outbound: Arc<dyn Outbound>,
        subscriptions: SharedSubscriptions,
        source_channel: String,
    ) -> Self {
        Self {
            outbound,
            subscriptions,
            source_channel,
        }
    }

    /// Sends the alert to every recipient concurrently, one attempt each.
    /// Recipients whose delivery is permanently denied are dropped from the
    /// store afterwards; other failures are only logged. Returns once every
    /// attempt has resolved.
    pub async fn dispatch(&self, text: &str, announcement_id: MessageId, recipients: Vec<ChatId>) {
        if recipients.is_empty() {
            return;
        }

        let link = format!(
            "https://t.me/{}/{}",
            self.source_channel, announcement_id.0
        );
        let link = match Url::parse(&link) {
            Ok(link) => link,
            Err(e) => {
                log::error!("Cannot build source link {link}: {e}");
                return;
            }
        };

        log::info!("Sending notification to {} chats", recipients.len());

        let alert = messages::announcement_alert(text);

        let attempts: Vec<_> = recipients
            .into_iter()
            .map(|chat_id| {
                let attempt = self.outbound.deliver(chat_id, alert.clone(), link.clone());
                tokio::spawn(async move { (chat_id, attempt.await) })
            })
            .collect();

        let mut revoked = Vec::new();
        for attempt in attempts {
            match attempt.await {
                Ok((_, Ok(()))) => {}
                Ok((chat_id, Err(DeliveryError::PermanentlyDenied))) => {
                    log::warn!("Chat {chat_id} revoked delivery access, dropping its subscriptions");
                    revoked.push(chat_id);
                }
                Ok((chat_id, Err(e))) => {
                    log::warn!("Couldn't send notification to {chat_id}: {e}");
                }
                Err(e) => log::error!("Notification task panicked: {e}"),
            }
        }

        if !revoked.is_empty() {
            let mut subscriptions = self.subscriptions.lock().await;
            for chat_id in revoked {
                subscriptions.remove_subscriber(chat_id);
            }
            subscriptions.save();
        }

        log::info!("Notification round finished");
    }
}
