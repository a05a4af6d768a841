use std::sync::Arc;

use teloxide::{prelude::*, types::ParseMode};
use tracing::error;

use relay_core::{formatting::format_recipient_list, store::RecipientStore, utils::AuditEvent};

use crate::keyboards::MenuAction;
use crate::router::{AppState, PendingAction};

use super::commands::send_menu;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let user_id = q.from.id.0 as i64;
    let username = q
        .from
        .username
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let data = q.data.clone().unwrap_or_default();

    // Always answer the callback so the client stops spinning.
    let _ = bot.answer_callback_query(cb_id).await;

    let Some(chat) = q.message.as_ref().map(|m| m.chat.clone()) else {
        return Ok(());
    };
    if !chat.is_private() {
        return Ok(());
    }
    let chat_id = chat.id;

    let Some(action) = MenuAction::parse(&data) else {
        return Ok(());
    };

    if action.is_admin_only() && !state.cfg.is_admin(user_id) {
        state
            .audit
            .write_or_log(AuditEvent::auth(user_id, &username, false, data.as_str()));
        bot.send_message(chat_id, "🚫 Only the administrator can do this.")
            .await?;
        return Ok(());
    }

    match action {
        MenuAction::ListGroups => {
            let html = list_html(state.broadcaster.groups(), "Groups", "📭 No groups yet.").await;
            bot.send_message(chat_id, html)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        MenuAction::ListUsers => {
            let html = list_html(state.broadcaster.users(), "Users", "📭 No users yet.").await;
            bot.send_message(chat_id, html)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        MenuAction::AddRecipient => {
            state.pending.set(user_id, PendingAction::AddRecipient).await;
            bot.send_message(
                chat_id,
                "➕ Send the id to add:\n- group: negative number\n- user: positive number\n\n/cancel to abort.",
            )
            .await?;
        }
        MenuAction::RemoveGroup => {
            state.pending.set(user_id, PendingAction::RemoveGroup).await;
            bot.send_message(chat_id, "🗑 Send the group id to remove (/cancel to abort):")
                .await?;
        }
        MenuAction::RemoveUser => {
            state.pending.set(user_id, PendingAction::RemoveUser).await;
            bot.send_message(chat_id, "🗑 Send the user id to remove (/cancel to abort):")
                .await?;
        }
        MenuAction::Refresh => {
            send_menu(&bot, chat_id, &state, user_id, "🔄 Menu refreshed:").await?;
        }
    }

    Ok(())
}

async fn list_html(store: &RecipientStore, title: &str, empty: &str) -> String {
    match store.snapshot().await {
        Ok(ids) => format_recipient_list(title, &ids, empty),
        Err(e) => {
            error!("failed to list recipients: {e}");
            "⚠️ The recipient list is busy right now, try again in a moment.".to_string()
        }
    }
}
