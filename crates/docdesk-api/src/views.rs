//! Row → wire conversions. Corrupt stored values are logged and replaced by
//! defaults rather than failing the whole listing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use docdesk_db::models::{DocumentRow, MessageRow, PartyRow, UserRow};
use docdesk_db::parse_timestamp;
use docdesk_types::models::{Document, Message, Role, User, UserSummary};
use tracing::warn;

/// Which joined parties a message listing carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parties {
    Sender,
    Receiver,
    Both,
}

fn parse_or<T: FromStr + Copy>(raw: &str, fallback: T, what: &str, row_id: i64) -> T
where
    T::Err: std::fmt::Display,
{
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} on row {}: {}", what, row_id, e);
        fallback
    })
}

fn timestamp(raw: &str, what: &str, row_id: i64) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt {} '{}' on row {}", what, raw, row_id);
        DateTime::default()
    })
}

pub fn user(row: UserRow) -> User {
    User {
        id: row.id,
        role: parse_or(&row.role, Role::User, "role", row.id),
        created_at: timestamp(&row.created_at, "created_at", row.id),
        updated_at: timestamp(&row.updated_at, "updated_at", row.id),
        name: row.name,
        email: row.email,
    }
}

/// `{id, name, email, role}`.
pub fn user_summary(row: &UserRow) -> UserSummary {
    UserSummary {
        id: row.id,
        name: row.name.clone(),
        email: row.email.clone(),
        role: Some(parse_or(&row.role, Role::User, "role", row.id)),
    }
}

/// `{id, name, email}`, the owner form attached to documents.
pub fn owner_summary(id: i64, name: &str, email: &str) -> UserSummary {
    UserSummary {
        id,
        name: name.to_string(),
        email: email.to_string(),
        role: None,
    }
}

fn party(row: PartyRow) -> UserSummary {
    UserSummary {
        role: Some(parse_or(&row.role, Role::User, "role", row.id)),
        id: row.id,
        name: row.name,
        email: row.email,
    }
}

pub fn document(row: DocumentRow, with_owner: bool) -> Document {
    let user = if with_owner {
        row.owner
            .as_ref()
            .map(|o| owner_summary(o.id, &o.name, &o.email))
    } else {
        None
    };
    Document {
        id: row.id,
        user_id: row.user_id,
        upload_date: timestamp(&row.upload_date, "upload_date", row.id),
        filename: row.filename,
        original_filename: row.original_filename,
        file_size: row.file_size,
        mime_type: row.mime_type,
        user,
    }
}

pub fn message(row: MessageRow, parties: Parties) -> Message {
    let id = row.id;
    let sender = match parties {
        Parties::Sender | Parties::Both => row.sender.map(party),
        Parties::Receiver => None,
    };
    let receiver = match parties {
        Parties::Receiver | Parties::Both => row.receiver.map(party),
        Parties::Sender => None,
    };
    Message {
        id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        is_read: row.is_read,
        message_type: parse_or(
            &row.message_type,
            docdesk_types::models::MessageType::UserToAdmin,
            "message_type",
            id,
        ),
        priority: parse_or(&row.priority, Default::default(), "priority", id),
        created_at: timestamp(&row.created_at, "created_at", id),
        read_at: row.read_at.as_deref().map(|raw| timestamp(raw, "read_at", id)),
        subject: row.subject,
        content: row.content,
        sender,
        receiver,
    }
}
