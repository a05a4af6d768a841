//! Telegram adapter (teloxide).
//!
//! Implements the `relay-core` [`Transport`] over the Telegram Bot API and
//! hosts the bot's private-chat UI.

use async_trait::async_trait;

use teloxide::{prelude::*, types::InputFile, ApiError, RequestError};

pub mod handlers;
pub mod keyboards;
pub mod router;

use relay_core::{
    domain::Recipient,
    messaging::{
        port::{is_permanent_description, Transport},
        types::{Outcome, Payload},
    },
};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(recipient: Recipient) -> teloxide::types::ChatId {
        teloxide::types::ChatId(recipient.0)
    }

    async fn try_send(
        &self,
        recipient: Recipient,
        payload: &Payload,
    ) -> std::result::Result<(), RequestError> {
        let chat = Self::tg_chat(recipient);
        match payload {
            // No parse mode: the text is relayed literally.
            Payload::Text { text } => {
                self.bot.send_message(chat, text.clone()).await?;
            }
            Payload::Photo { file_id, caption } => {
                let mut req = self.bot.send_photo(chat, InputFile::file_id(file_id.clone()));
                if let Some(c) = caption {
                    req = req.caption(c.clone());
                }
                req.await?;
            }
            Payload::Video { file_id, caption } => {
                let mut req = self.bot.send_video(chat, InputFile::file_id(file_id.clone()));
                if let Some(c) = caption {
                    req = req.caption(c.clone());
                }
                req.await?;
            }
            Payload::Sticker { file_id } => {
                self.bot
                    .send_sticker(chat, InputFile::file_id(file_id.clone()))
                    .await?;
            }
            Payload::Animation { file_id, caption } => {
                let mut req = self
                    .bot
                    .send_animation(chat, InputFile::file_id(file_id.clone()));
                if let Some(c) = caption {
                    req = req.caption(c.clone());
                }
                req.await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, recipient: Recipient, payload: &Payload) -> Outcome {
        match self.try_send(recipient, payload).await {
            Ok(()) => Outcome::Delivered,
            Err(e) => classify(&e),
        }
    }
}

/// Maps a Bot API failure onto the dispatch loop's outcome classes.
pub fn classify(err: &RequestError) -> Outcome {
    match err {
        RequestError::RetryAfter(d) => Outcome::RateLimited(*d),
        // The group became a supergroup; the old id will never work again.
        RequestError::MigrateToChatId(_) => Outcome::permanent(err.to_string()),
        RequestError::Api(api) => classify_api(api),
        other => Outcome::transient(other.to_string()),
    }
}

fn classify_api(api: &ApiError) -> Outcome {
    match api {
        ApiError::BotBlocked
        | ApiError::BotKicked
        | ApiError::BotKickedFromSupergroup
        | ApiError::ChatNotFound
        | ApiError::UserNotFound
        | ApiError::UserDeactivated
        | ApiError::CantInitiateConversation
        | ApiError::CantTalkWithBots => Outcome::permanent(api.to_string()),
        ApiError::Unknown(desc) if is_permanent_description(desc) => Outcome::permanent(desc.clone()),
        other => Outcome::transient(other.to_string()),
    }
}
