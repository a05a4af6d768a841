use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatAction, ParseMode},
};
use tracing::info;

use relay_core::{
    domain::UserId,
    formatting::format_broadcast_summary,
    messaging::types::Payload,
    security::resolve_access,
    utils::AuditEvent,
};

use crate::router::AppState;

/// Turns an incoming private message into a replayable payload.
///
/// Media is referenced by file id, so nothing is re-uploaded. For photos the
/// largest size (the last one) is relayed.
pub fn payload_from_message(msg: &Message) -> Option<Payload> {
    let caption = msg.caption().map(str::to_string);

    if let Some(sizes) = msg.photo() {
        let best = sizes.last()?;
        return Some(Payload::Photo {
            file_id: best.file.id.clone(),
            caption,
        });
    }
    // Animations also carry a document; check them before anything generic.
    if let Some(animation) = msg.animation() {
        return Some(Payload::Animation {
            file_id: animation.file.id.clone(),
            caption,
        });
    }
    if let Some(video) = msg.video() {
        return Some(Payload::Video {
            file_id: video.file.id.clone(),
            caption,
        });
    }
    if let Some(sticker) = msg.sticker() {
        return Some(Payload::Sticker {
            file_id: sticker.file.id.clone(),
        });
    }

    let text = msg.text()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(Payload::text(text))
}

pub async fn handle_broadcast(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let username = user
        .username
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let chat_id = msg.chat.id;

    let access = resolve_access(
        Some(UserId(user_id)),
        &state.cfg.admin_ids,
        state.broadcaster.users(),
    )
    .await;
    if !access.can_broadcast() {
        state
            .audit
            .write_or_log(AuditEvent::auth(user_id, &username, false, "broadcast"));
        bot.send_message(chat_id, "🚫 You are not allowed to broadcast.")
            .await?;
        return Ok(());
    }

    let Some(payload) = payload_from_message(&msg) else {
        bot.send_message(
            chat_id,
            "🤷 This message type can't be relayed. Send text, a photo, a video, a sticker or a GIF.",
        )
        .await?;
        return Ok(());
    };

    info!(user_id, kind = %payload.kind(), "broadcast requested");
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let summary = state.broadcaster.submit_broadcast(&payload).await;

    state.audit.write_or_log(AuditEvent::broadcast(
        user_id,
        &username,
        payload.kind().as_str(),
        &payload.describe(),
        &summary,
    ));

    bot.send_message(chat_id, format_broadcast_summary(&summary))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}
