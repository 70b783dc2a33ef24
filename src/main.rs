mod config;
mod matching;
mod messages;
mod notify;
mod pending;
mod storage;

use std::sync::Arc;

use config::Config;
use notify::Notifier;
use pending::{PendingAdds, SharedPending};
use storage::{SharedSubscriptions, Subscriptions};
use teloxide::adaptors::throttle::Limits;
use teloxide::dptree::{self, deps};
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};
use teloxide::utils::command::{BotCommands, ParseError};
use teloxide::RequestError;
use tokio::sync::Mutex;

pub type Bot = teloxide::adaptors::Throttle<teloxide::Bot>;

/// Takes the whole remainder of the message as one argument, so street
/// names with spaces need no quoting. Never fails; emptiness is reported
/// to the user by the handler instead.
fn rest(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_owned(),))
}

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Підтримувані команди:")]
enum Command {
    #[command(description = "почати і додати першу вулицю.")]
    Start,
    #[command(description = "показати цю довідку.")]
    Help,
    #[command(description = "додати вулицю до списку моніторингу.")]
    AddStreet,
    #[command(description = "показати ваші вулиці.")]
    MyStreets,
    #[command(description = "видалити вулицю зі списку.", parse_with = rest)]
    RemoveStreet { street: String },
    #[command(description = "відписатися і видалити всі дані.")]
    Stop,
}

async fn reply(bot: &Bot, msg: &Message, text: String) -> Result<(), RequestError> {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

async fn answer(
    bot: Bot,
    msg: Message,
    cmd: Command,
    subscriptions: SharedSubscriptions,
    pending: SharedPending,
) -> Result<(), RequestError> {
    log::info!("{:?}", cmd);
    let chat_id = msg.chat.id;

    match cmd {
        Command::Start => {
            pending.lock().await.set(chat_id);
            reply(&bot, &msg, messages::greeting()).await?;
        }
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string())
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
        Command::AddStreet => {
            pending.lock().await.set(chat_id);
            reply(&bot, &msg, messages::street_prompt()).await?;
        }
        Command::MyStreets => {
            let streets = subscriptions.lock().await.streets_for(chat_id);
            reply(&bot, &msg, messages::street_list(&streets)).await?;
        }
        Command::RemoveStreet { street } => {
            if street.is_empty() {
                reply(&bot, &msg, messages::remove_street_usage()).await?;
                return Ok(());
            }

            let removed = {
                let mut subscriptions = subscriptions.lock().await;
                let removed = subscriptions.remove_street(chat_id, &street);
                subscriptions.save();
                removed
            };

            reply(&bot, &msg, messages::street_removed(&street, removed)).await?;
        }
        Command::Stop => {
            {
                let mut subscriptions = subscriptions.lock().await;
                subscriptions.remove_subscriber(chat_id);
                subscriptions.save();
            }
            pending.lock().await.clear(chat_id);
            reply(&bot, &msg, messages::unsubscribed()).await?;
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum TextOutcome {
    Added(String),
    Ignored,
    NotAwaiting,
}

/// Applies a free-text message to the add-street dialog. While a chat is
/// awaiting a street name, the entire trimmed text becomes the street and
/// the flag is cleared in the same step. Whitespace-only input keeps the
/// dialog open and gets no reply.
async fn accept_street_text(
    chat_id: ChatId,
    text: &str,
    subscriptions: &SharedSubscriptions,
    pending: &SharedPending,
) -> TextOutcome {
    if !pending.lock().await.has(chat_id) {
        return TextOutcome::NotAwaiting;
    }

    let street = text.trim();
    if street.is_empty() {
        return TextOutcome::Ignored;
    }

    {
        let mut subscriptions = subscriptions.lock().await;
        subscriptions.add_street(chat_id, street);
        subscriptions.save();
    }
    pending.lock().await.clear(chat_id);

    TextOutcome::Added(street.to_owned())
}

async fn on_text(
    bot: Bot,
    msg: Message,
    subscriptions: SharedSubscriptions,
    pending: SharedPending,
) -> Result<(), RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    match accept_street_text(msg.chat.id, text, &subscriptions, &pending).await {
        TextOutcome::Added(street) => reply(&bot, &msg, messages::street_added(&street)).await,
        TextOutcome::Ignored => Ok(()),
        TextOutcome::NotAwaiting => reply(&bot, &msg, messages::unknown_text()).await,
    }
}

async fn on_channel_post(
    msg: Message,
    config: Arc<Config>,
    subscriptions: SharedSubscriptions,
    notifier: Notifier,
) -> Result<(), RequestError> {
    let from_source = msg
        .chat
        .username()
        .is_some_and(|username| username.to_lowercase() == config.source_channel);
    if !from_source {
        return Ok(());
    }

    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        return Ok(());
    };

    log::info!("Channel post #{} received", msg.id.0);

    let recipients = {
        let subscriptions = subscriptions.lock().await;
        matching::affected_subscribers(text, subscriptions.all())
    };

    if recipients.is_empty() {
        log::info!("No matching subscribers");
        return Ok(());
    }

    log::info!("Found matches for {} chats", recipients.len());
    notifier.dispatch(text, msg.id, recipients).await;

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            log::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    log::info!("Starting bot, watching @{}", config.source_channel);

    let subscriptions: SharedSubscriptions =
        Arc::new(Mutex::new(Subscriptions::load(&config.subscriptions_file)));
    let pending: SharedPending = Arc::new(Mutex::new(PendingAdds::default()));

    let bot: Bot = teloxide::Bot::new(&config.bot_token).throttle(Limits::default());
    let notifier = Notifier::new(
        bot.clone(),
        subscriptions.clone(),
        config.source_channel.clone(),
    );

    let handler = dptree::entry()
        .branch(Update::filter_channel_post().endpoint(on_channel_post))
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(answer),
        )
        .branch(Update::filter_message().endpoint(on_text));

    Dispatcher::builder(bot, handler)
        .dependencies(deps![config, subscriptions.clone(), pending, notifier])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // the ctrl-c handler has stopped the dispatcher; in-flight notification
    // tasks are abandoned, the store gets one last best-effort save
    log::info!("Shutting down");
    subscriptions.lock().await.save();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_store() -> (tempfile::TempDir, SharedSubscriptions) {
        let dir = tempfile::tempdir().unwrap();
        let store = Subscriptions::load(dir.path().join("subs.json"));
        (dir, Arc::new(Mutex::new(store)))
    }

    fn shared_pending() -> SharedPending {
        Arc::new(Mutex::new(PendingAdds::default()))
    }

    #[tokio::test]
    async fn pending_chat_text_adds_street_and_closes_dialog() {
        let (_dir, subscriptions) = shared_store();
        let pending = shared_pending();
        let chat = ChatId(1);

        pending.lock().await.set(chat);

        let outcome = accept_street_text(chat, "  Шевченка ", &subscriptions, &pending).await;

        assert_eq!(outcome, TextOutcome::Added("Шевченка".to_string()));
        assert_eq!(
            subscriptions.lock().await.streets_for(chat),
            vec!["шевченка"]
        );
        assert!(!pending.lock().await.has(chat));
    }

    #[tokio::test]
    async fn whitespace_only_text_keeps_dialog_open() {
        let (_dir, subscriptions) = shared_store();
        let pending = shared_pending();
        let chat = ChatId(2);

        pending.lock().await.set(chat);

        let outcome = accept_street_text(chat, "   ", &subscriptions, &pending).await;

        assert_eq!(outcome, TextOutcome::Ignored);
        assert!(pending.lock().await.has(chat));
        assert!(subscriptions.lock().await.streets_for(chat).is_empty());
    }

    #[tokio::test]
    async fn text_without_open_dialog_adds_nothing() {
        let (_dir, subscriptions) = shared_store();
        let pending = shared_pending();
        let chat = ChatId(3);

        let outcome = accept_street_text(chat, "Шевченка", &subscriptions, &pending).await;

        assert_eq!(outcome, TextOutcome::NotAwaiting);
        assert!(subscriptions.lock().await.streets_for(chat).is_empty());
    }

    #[test]
    fn remove_street_parser_takes_the_whole_remainder() {
        assert_eq!(
            rest(" Велика Перспективна ".to_string()).unwrap().0,
            "Велика Перспективна"
        );
        assert_eq!(rest(String::new()).unwrap().0, "");
    }
}
