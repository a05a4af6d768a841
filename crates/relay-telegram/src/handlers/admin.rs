use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};

use relay_core::{domain::Recipient, utils::AuditEvent, Result};

use crate::router::{AppState, PendingAction};

/// What a validated id edit did to the stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EditReply {
    GroupAdded,
    UserAdded,
    GroupRemoved,
    UserRemoved,
    Unchanged,
}

impl EditReply {
    fn text(self) -> &'static str {
        match self {
            EditReply::GroupAdded => "✅ Group added.",
            EditReply::UserAdded => "✅ User added.",
            EditReply::GroupRemoved => "🗑 Group removed.",
            EditReply::UserRemoved => "🗑 User removed.",
            EditReply::Unchanged => "ℹ️ Nothing changed: the id was already in that state.",
        }
    }
}

fn parse_recipient(text: &str) -> Option<Recipient> {
    match text.trim().parse::<i64>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(Recipient(id)),
    }
}

fn action_name(action: PendingAction, id: Recipient) -> &'static str {
    match action {
        PendingAction::AddRecipient if id.is_group() => "add_group",
        PendingAction::AddRecipient => "add_user",
        PendingAction::RemoveGroup => "remove_group",
        PendingAction::RemoveUser => "remove_user",
    }
}

async fn apply(state: &AppState, action: PendingAction, id: Recipient) -> Result<EditReply> {
    let groups = state.broadcaster.groups();
    let users = state.broadcaster.users();

    let reply = match action {
        PendingAction::AddRecipient if id.is_group() => {
            if groups.add(id).await? {
                EditReply::GroupAdded
            } else {
                EditReply::Unchanged
            }
        }
        PendingAction::AddRecipient => {
            if users.add(id).await? {
                EditReply::UserAdded
            } else {
                EditReply::Unchanged
            }
        }
        PendingAction::RemoveGroup => {
            if groups.remove(id).await? {
                EditReply::GroupRemoved
            } else {
                EditReply::Unchanged
            }
        }
        PendingAction::RemoveUser => {
            if users.remove(id).await? {
                EditReply::UserRemoved
            } else {
                EditReply::Unchanged
            }
        }
    };
    Ok(reply)
}

pub async fn handle_pending_input(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let username = user
        .username
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let chat_id = msg.chat.id;

    // Admin rights may have been revoked since the prompt was shown.
    if !state.cfg.is_admin(user_id) {
        state.pending.take(user_id).await;
        bot.send_message(chat_id, "🚫 Only the administrator can do this.")
            .await?;
        return Ok(());
    }

    // Keep the prompt pending until a usable id arrives; media has no text.
    let Some(id) = msg.text().and_then(parse_recipient) else {
        bot.send_message(chat_id, "❌ The id must be a non-zero integer. Try again or /cancel.")
            .await?;
        return Ok(());
    };
    let Some(action) = state.pending.take(user_id).await else {
        return Ok(());
    };

    match apply(&state, action, id).await {
        Ok(reply) => {
            let changed = reply != EditReply::Unchanged;
            info!(%id, action = action_name(action, id), changed, "recipient store edited");
            state.audit.write_or_log(AuditEvent::store_change(
                user_id,
                &username,
                action_name(action, id),
                id,
                changed,
            ));
            bot.send_message(chat_id, reply.text()).await?;
        }
        Err(e) => {
            error!(%id, "recipient store edit failed: {e}");
            state.audit.write_or_log(AuditEvent::error(
                user_id,
                &username,
                &e.to_string(),
                Some(action_name(action, id)),
            ));
            bot.send_message(
                chat_id,
                "⚠️ The recipient list is busy right now, nothing was changed. Try again.",
            )
            .await?;
        }
    }

    Ok(())
}
