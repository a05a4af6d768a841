use crate::{
    domain::{Recipient, UserId},
    store::RecipientStore,
};

// ============== Authorization ==============

/// What a private-chat sender may do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Configured admin: may broadcast and edit the recipient stores.
    Admin,
    /// Listed in the user store: may broadcast.
    Broadcaster,
    Denied,
}

impl Access {
    pub fn can_broadcast(self) -> bool {
        matches!(self, Access::Admin | Access::Broadcaster)
    }
}

pub fn is_admin(user_id: Option<UserId>, admin_ids: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    admin_ids.contains(&user_id.0)
}

/// Resolves access for `user_id`. The user store doubles as the broadcast
/// allow-list; when it is unreadable the last cached list is used.
pub async fn resolve_access(
    user_id: Option<UserId>,
    admin_ids: &[i64],
    users: &RecipientStore,
) -> Access {
    if is_admin(user_id, admin_ids) {
        return Access::Admin;
    }
    let Some(user_id) = user_id else {
        return Access::Denied;
    };

    let (allowed, _) = users.snapshot_or_cached().await;
    if allowed.contains(&Recipient(user_id.0)) {
        Access::Broadcaster
    } else {
        Access::Denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{tests::tmp_store_path, DEFAULT_LOCK_TIMEOUT};

    #[test]
    fn admin_check_requires_known_user() {
        assert!(is_admin(Some(UserId(1)), &[1, 2]));
        assert!(!is_admin(Some(UserId(3)), &[1, 2]));
        assert!(!is_admin(None, &[1, 2]));
        assert!(!is_admin(Some(UserId(1)), &[]));
    }

    #[tokio::test]
    async fn user_store_grants_broadcast_but_not_management() {
        let users = RecipientStore::new(tmp_store_path("relay-access"), DEFAULT_LOCK_TIMEOUT);
        users.add(Recipient(77)).await.unwrap();

        let admin = resolve_access(Some(UserId(1)), &[1], &users).await;
        assert_eq!(admin, Access::Admin);
        assert!(admin.can_broadcast());

        let listed = resolve_access(Some(UserId(77)), &[1], &users).await;
        assert_eq!(listed, Access::Broadcaster);
        assert!(listed.can_broadcast());
        assert_ne!(listed, Access::Admin);

        let stranger = resolve_access(Some(UserId(5)), &[1], &users).await;
        assert_eq!(stranger, Access::Denied);
        assert!(!stranger.can_broadcast());

        assert_eq!(resolve_access(None, &[1], &users).await, Access::Denied);
    }
}
