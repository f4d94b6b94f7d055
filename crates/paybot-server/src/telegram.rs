//! Telegram bot: command handling and message delivery

use async_trait::async_trait;
use chrono::Utc;
use teloxide::{prelude::*, utils::command::BotCommands};

use paybot_payments::{Messenger, PaymentError};

use crate::state::AppState;

/// Delivers payment messages through the Bot API
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> paybot_payments::Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| PaymentError::Messaging(e.to_string()))
    }
}

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show this help")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "get a payment link for premium access")]
    Subscribe,
    #[command(description = "show when your subscription ends")]
    Status,
}

/// Run the long-polling dispatcher until the process stops
pub async fn run(bot: Bot, state: AppState) {
    let handler = Update::filter_message()
        .filter_command::<Command>()
        .endpoint(answer);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;
}

async fn answer(bot: Bot, msg: Message, cmd: Command, state: AppState) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    let user_id = msg
        .from
        .as_ref()
        .and_then(|user| i64::try_from(user.id.0).ok())
        .unwrap_or(chat_id);

    match cmd {
        Command::Start | Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::Subscribe => {
            tracing::info!(user_id, chat_id, "Subscription requested");
            state.orchestrator.process_payment(user_id, chat_id).await;
        }
        Command::Status => {
            let text = status_text(state.store.get(user_id).await.map(|r| r.subscription_end));
            bot.send_message(msg.chat.id, text).await?;
        }
    }

    Ok(())
}

fn status_text(subscription_end: Option<chrono::DateTime<Utc>>) -> String {
    match subscription_end {
        Some(end) if end > Utc::now() => format!(
            "Your premium access is active until {}.",
            end.format("%Y-%m-%d %H:%M UTC")
        ),
        Some(end) => format!(
            "Your premium access ended on {}. Use /subscribe to renew.",
            end.format("%Y-%m-%d")
        ),
        None => "You have no subscription yet. Use /subscribe to get one.".into(),
    }
}
