use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatId, ParseMode},
};

use relay_core::formatting::escape_html;

use crate::keyboards::{inline_menu, main_menu};
use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn send_menu(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: i64,
    title: &str,
) -> ResponseResult<()> {
    bot.send_message(chat_id, title.to_string())
        .reply_markup(inline_menu(state.cfg.is_admin(user_id)))
        .await?;
    Ok(())
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let first_name = user.first_name.clone();
    let chat_id = msg.chat.id;
    let (cmd, _args) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "start" => {
            let greeting = format!(
                "<b>Hi, {}!</b>\nI relay text, photos, videos, stickers and GIFs to the registered groups.\nSend me a message to broadcast it, or use the buttons below.",
                escape_html(&first_name)
            );
            bot.send_message(chat_id, greeting)
                .parse_mode(ParseMode::Html)
                .reply_markup(inline_menu(state.cfg.is_admin(user_id)))
                .await?;
            bot.send_message(chat_id, "🔽 Main menu:")
                .reply_markup(main_menu())
                .await?;
        }
        "menu" => send_menu(&bot, chat_id, &state, user_id, "✨ Menu:").await?,
        "count" => {
            let n = state.broadcaster.current_recipient_count().await;
            bot.send_message(chat_id, format!("📊 Broadcast targets: {n}"))
                .await?;
        }
        "cancel" => {
            let reply = if state.pending.take(user_id).await.is_some() {
                "✖️ Cancelled."
            } else {
                "Nothing to cancel."
            };
            bot.send_message(chat_id, reply).await?;
        }
        "help" => {
            bot.send_message(
                chat_id,
                "/start - greeting and menu\n/menu - show the menu\n/count - number of broadcast targets\n/cancel - abort a pending id prompt\n\nAny other message is broadcast.",
            )
            .await?;
        }
        _ => {
            bot.send_message(chat_id, "Unknown command. Try /help.")
                .await?;
        }
    }

    Ok(())
}
