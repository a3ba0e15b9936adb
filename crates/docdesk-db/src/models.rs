//! Database row types: these map directly to SQLite rows.
//! Distinct from docdesk-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The columns of a user that get joined onto documents and messages.
#[derive(Debug, Clone)]
pub struct PartyRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub original_filename: String,
    pub filepath: String,
    pub file_size: i64,
    pub mime_type: String,
    pub upload_date: String,
    pub owner: Option<PartyRow>,
}

pub struct NewDocument<'a> {
    pub user_id: i64,
    pub filename: &'a str,
    pub original_filename: &'a str,
    pub filepath: &'a str,
    pub file_size: i64,
    pub mime_type: &'a str,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub subject: String,
    pub content: String,
    pub is_read: bool,
    pub message_type: String,
    pub priority: String,
    pub created_at: String,
    pub read_at: Option<String>,
    pub sender: Option<PartyRow>,
    pub receiver: Option<PartyRow>,
}

/// Filters for the admin-wide message listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFilter<'a> {
    pub unread_only: bool,
    pub priority: Option<&'a str>,
}
