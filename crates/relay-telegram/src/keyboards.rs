use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

/// Text of the persistent reply-keyboard button that reopens the inline menu.
pub const SHOW_MENU: &str = "✨ Show menu";

/// Inline menu buttons, encoded as callback data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    ListGroups,
    ListUsers,
    AddRecipient,
    RemoveGroup,
    RemoveUser,
    Refresh,
}

impl MenuAction {
    pub fn callback_data(self) -> &'static str {
        match self {
            MenuAction::ListGroups => "list_groups",
            MenuAction::ListUsers => "list_users",
            MenuAction::AddRecipient => "add_entity",
            MenuAction::RemoveGroup => "remove_group",
            MenuAction::RemoveUser => "remove_user",
            MenuAction::Refresh => "refresh_menu",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        Some(match data {
            "list_groups" => MenuAction::ListGroups,
            "list_users" => MenuAction::ListUsers,
            "add_entity" => MenuAction::AddRecipient,
            "remove_group" => MenuAction::RemoveGroup,
            "remove_user" => MenuAction::RemoveUser,
            "refresh_menu" => MenuAction::Refresh,
            _ => return None,
        })
    }

    fn label(self) -> &'static str {
        match self {
            MenuAction::ListGroups => "📋 Groups",
            MenuAction::ListUsers => "👥 Users",
            MenuAction::AddRecipient => "➕ Add",
            MenuAction::RemoveGroup => "🗑 Remove group",
            MenuAction::RemoveUser => "🗑 Remove user",
            MenuAction::Refresh => "🔄 Refresh menu",
        }
    }

    /// Whether the action edits a recipient store.
    pub fn is_admin_only(self) -> bool {
        matches!(
            self,
            MenuAction::AddRecipient | MenuAction::RemoveGroup | MenuAction::RemoveUser
        )
    }

    fn button(self) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(self.label(), self.callback_data())
    }
}

fn menu_rows(is_admin: bool) -> Vec<Vec<MenuAction>> {
    use MenuAction::*;
    if is_admin {
        vec![
            vec![ListGroups, ListUsers],
            vec![AddRecipient, RemoveGroup],
            vec![RemoveUser, Refresh],
        ]
    } else {
        vec![vec![ListGroups, ListUsers], vec![Refresh]]
    }
}

pub fn inline_menu(is_admin: bool) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = menu_rows(is_admin)
        .into_iter()
        .map(|row| row.into_iter().map(MenuAction::button).collect())
        .collect();
    InlineKeyboardMarkup::new(rows)
}

pub fn main_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(SHOW_MENU)]]).resize_keyboard(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_round_trips() {
        for row in menu_rows(true) {
            for action in row {
                assert_eq!(MenuAction::parse(action.callback_data()), Some(action));
            }
        }
        assert_eq!(MenuAction::parse("unknown:1"), None);
    }

    #[test]
    fn non_admin_menu_has_no_store_edits() {
        let actions: Vec<MenuAction> = menu_rows(false).into_iter().flatten().collect();
        assert!(actions.iter().all(|a| !a.is_admin_only()));
        assert_eq!(actions.len(), 3);

        let admin: Vec<MenuAction> = menu_rows(true).into_iter().flatten().collect();
        assert_eq!(admin.iter().filter(|a| a.is_admin_only()).count(), 3);
    }

    #[test]
    fn show_menu_keyboard_is_compact() {
        let v = serde_json::to_value(main_menu()).unwrap();
        assert_eq!(v["resize_keyboard"], true);
        assert_eq!(v["keyboard"][0][0]["text"], SHOW_MENU);
    }
}
