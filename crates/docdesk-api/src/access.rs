//! Ownership rules for documents and messages.
//!
//! Every handler that reads or mutates a single document or message goes
//! through `check_document` / `check_message`. Admins pass every check; other
//! callers pass only when they hold the relevant ownership column.
//!
//! Documents answer 403 when the row exists but belongs to someone else.
//! Messages answer 404 so their existence is not disclosed to non-parties.

use docdesk_db::models::{DocumentRow, MessageRow};
use docdesk_types::models::Role;

use crate::error::ApiError;

/// The authenticated account behind a request, as loaded by `require_auth`.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// `owner_id == caller.id || caller.role == admin`
    pub fn owns_or_admin(&self, owner_id: i64) -> bool {
        self.is_admin() || owner_id == self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
    View,
    MarkRead,
    Delete,
}

impl MessageAction {
    /// Which party's id decides ownership for this action.
    fn owner(self, sender_id: i64, receiver_id: i64) -> i64 {
        match self {
            Self::View | Self::MarkRead => receiver_id,
            Self::Delete => sender_id,
        }
    }
}

pub fn may_act_on_message(
    caller: &Caller,
    action: MessageAction,
    sender_id: i64,
    receiver_id: i64,
) -> bool {
    caller.owns_or_admin(action.owner(sender_id, receiver_id))
}

pub fn check_document(caller: &Caller, doc: &DocumentRow) -> Result<(), ApiError> {
    if caller.owns_or_admin(doc.user_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Access denied".into()))
    }
}

pub fn check_message(
    caller: &Caller,
    message: &MessageRow,
    action: MessageAction,
) -> Result<(), ApiError> {
    if may_act_on_message(caller, action, message.sender_id, message.receiver_id) {
        Ok(())
    } else {
        Err(ApiError::NotFound("Message not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: i64, role: Role) -> Caller {
        Caller {
            id,
            name: format!("caller {id}"),
            email: format!("caller{id}@example.com"),
            role,
        }
    }

    #[test]
    fn owner_or_admin() {
        let user = caller(1, Role::User);
        let admin = caller(9, Role::Admin);
        assert!(user.owns_or_admin(1));
        assert!(!user.owns_or_admin(2));
        assert!(admin.owns_or_admin(2));
    }

    #[test]
    fn receiver_views_and_marks_read_sender_deletes() {
        let (sender, receiver, stranger) =
            (caller(1, Role::User), caller(2, Role::User), caller(3, Role::User));

        for action in [MessageAction::View, MessageAction::MarkRead] {
            assert!(may_act_on_message(&receiver, action, 1, 2));
            assert!(!may_act_on_message(&sender, action, 1, 2));
            assert!(!may_act_on_message(&stranger, action, 1, 2));
        }

        assert!(may_act_on_message(&sender, MessageAction::Delete, 1, 2));
        assert!(!may_act_on_message(&receiver, MessageAction::Delete, 1, 2));
        assert!(!may_act_on_message(&stranger, MessageAction::Delete, 1, 2));
    }

    #[test]
    fn admin_may_act_on_any_message() {
        let admin = caller(9, Role::Admin);
        for action in [MessageAction::View, MessageAction::MarkRead, MessageAction::Delete] {
            assert!(may_act_on_message(&admin, action, 1, 2));
        }
    }

    #[test]
    fn document_violation_is_forbidden() {
        let doc = DocumentRow {
            id: 5,
            user_id: 1,
            filename: "f".into(),
            original_filename: "f.txt".into(),
            filepath: "uploads/f".into(),
            file_size: 1,
            mime_type: "text/plain".into(),
            upload_date: "2024-01-01T00:00:00.000000Z".into(),
            owner: None,
        };
        assert!(check_document(&caller(1, Role::User), &doc).is_ok());
        assert!(check_document(&caller(7, Role::Admin), &doc).is_ok());
        let err = check_document(&caller(2, Role::User), &doc).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
