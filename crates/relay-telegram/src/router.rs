use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    update_listeners::webhooks,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use relay_core::{
    broadcast::BroadcastService, config::Config, messaging::port::Transport,
    store::RecipientStore, utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramTransport;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub broadcaster: Arc<BroadcastService>,
    pub pending: Arc<PendingInputs>,
    pub audit: Arc<AuditLogger>,
}

/// Store edit waiting for the admin to type a recipient id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction {
    AddRecipient,
    RemoveGroup,
    RemoveUser,
}

/// Per-user pending prompts (one at most per user).
#[derive(Default)]
pub struct PendingInputs {
    inner: Mutex<HashMap<i64, PendingAction>>,
}

impl PendingInputs {
    pub async fn set(&self, user_id: i64, action: PendingAction) {
        self.inner.lock().await.insert(user_id, action);
    }

    pub async fn peek(&self, user_id: i64) -> Option<PendingAction> {
        self.inner.lock().await.get(&user_id).copied()
    }

    pub async fn take(&self, user_id: i64) -> Option<PendingAction> {
        self.inner.lock().await.remove(&user_id)
    }
}

pub async fn run(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    match bot.get_me().await {
        Ok(me) => info!("broadcast relay started: @{}", me.username()),
        Err(e) => warn!("get_me failed (continuing): {e}"),
    }
    info!(
        groups = %cfg.groups_file.display(),
        users = %cfg.users_file.display(),
        admins = cfg.admin_ids.len(),
        broadcast_to_users = cfg.broadcast_to_users,
        "recipient stores configured"
    );

    let groups = Arc::new(RecipientStore::new(&cfg.groups_file, cfg.store_lock_timeout));
    let users = Arc::new(RecipientStore::new(&cfg.users_file, cfg.store_lock_timeout));
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));
    let broadcaster = Arc::new(BroadcastService::new(
        groups,
        users,
        transport,
        cfg.broadcast(),
    ));
    info!(
        recipients = broadcaster.current_recipient_count().await,
        "broadcast targets loaded"
    );

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        broadcaster,
        pending: Arc::new(PendingInputs::default()),
        audit: Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        )),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match &cfg.webhook_url {
        Some(raw) => {
            let url: url::Url = raw
                .parse()
                .with_context(|| format!("invalid webhook url: {raw}"))?;
            info!(%url, addr = %cfg.listen_addr, "serving webhook");
            let listener = webhooks::axum(bot, webhooks::Options::new(cfg.listen_addr, url))
                .await
                .context("failed to set up webhook")?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("webhook listener error"),
                )
                .await;
        }
        None => {
            info!("long polling for updates");
            dispatcher.dispatch().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_input_is_per_user_and_taken_once() {
        let p = PendingInputs::default();
        p.set(1, PendingAction::AddRecipient).await;
        p.set(2, PendingAction::RemoveUser).await;

        assert_eq!(p.peek(1).await, Some(PendingAction::AddRecipient));
        assert_eq!(p.peek(1).await, Some(PendingAction::AddRecipient));
        assert_eq!(p.take(1).await, Some(PendingAction::AddRecipient));
        assert_eq!(p.take(1).await, None);
        assert_eq!(p.peek(2).await, Some(PendingAction::RemoveUser));

        p.set(2, PendingAction::RemoveGroup).await;
        assert_eq!(p.take(2).await, Some(PendingAction::RemoveGroup));
    }
}
