//! Telegram update handlers.
//!
//! Only private chats are served. Each handler is a small adapter that:
//! - resolves the sender's access (admin / broadcaster / denied)
//! - turns the update into a store edit or a broadcast payload
//! - calls into `relay-core` and reports the result back to the sender

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use crate::keyboards::SHOW_MENU;
use crate::router::AppState;

mod admin;
mod broadcast;
mod callback;
mod commands;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

/// Where a private message goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Command,
    ShowMenu,
    PendingInput,
    Broadcast,
}

/// Commands always win so `/cancel` works mid-prompt. While an id prompt is
/// open, every other message (media included) is treated as the answer and
/// never broadcast.
fn route(text: Option<&str>, has_pending: bool) -> Route {
    match text {
        Some(t) if t.starts_with('/') => Route::Command,
        Some(t) if t == SHOW_MENU => Route::ShowMenu,
        _ if has_pending => Route::PendingInput,
        _ => Route::Broadcast,
    }
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(user_id) = msg.from().map(|u| u.id.0 as i64) else {
        return Ok(());
    };

    let has_pending = state.pending.peek(user_id).await.is_some();
    match route(msg.text(), has_pending) {
        Route::Command => commands::handle_command(bot, msg, state).await,
        Route::ShowMenu => commands::send_menu(&bot, msg.chat.id, &state, user_id, "✨ Menu:").await,
        Route::PendingInput => admin::handle_pending_input(bot, msg, state).await,
        Route::Broadcast => broadcast::handle_broadcast(bot, msg, state).await,
    }
}
