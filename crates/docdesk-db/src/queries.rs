use crate::models::{DocumentRow, MessageFilter, MessageRow, NewDocument, PartyRow, UserRow};
use crate::{Database, now_timestamp};
use anyhow::Result;
use docdesk_types::models::{MessageType, Priority, Role};
use rusqlite::{Connection, Row, params};

const USER_COLUMNS: &str = "id, name, email, password, role, created_at, updated_at";

const DOCUMENT_SELECT: &str = "
    SELECT d.id, d.user_id, d.filename, d.original_filename, d.filepath, d.file_size,
           d.mime_type, d.upload_date, u.id, u.name, u.email, u.role
    FROM documents d
    LEFT JOIN users u ON u.id = d.user_id";

// JOIN both parties in one query (no N+1 when listing)
const MESSAGE_SELECT: &str = "
    SELECT m.id, m.sender_id, m.receiver_id, m.subject, m.content, m.is_read,
           m.message_type, m.priority, m.created_at, m.read_at,
           s.id, s.name, s.email, s.role,
           r.id, r.name, r.email, r.role
    FROM messages m
    LEFT JOIN users s ON s.id = m.sender_id
    LEFT JOIN users r ON r.id = m.receiver_id";

const MESSAGE_ORDER: &str = "ORDER BY m.created_at DESC, m.id DESC";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let now = now_timestamp();
            conn.execute(
                "INSERT INTO users (name, email, password, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![name, email, password_hash, role.as_str(), now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            conn.query_row(&sql, [email], user_from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            conn.query_row(&sql, [id], user_from_row).optional()
        })
    }

    /// All accounts, or only those with `role`, newest first.
    pub fn list_users(&self, role: Option<Role>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE ?1 IS NULL OR role = ?1
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([role.map(|r| r.as_str())], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_user_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, password_hash, now_timestamp()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_user_role(&self, id: i64, role: Role) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, role.as_str(), now_timestamp()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes the account and returns the storage paths of the documents it
    /// owned, or `None` when there is no such account. Documents and messages
    /// (sent and received) go with it through `ON DELETE CASCADE`; the files
    /// are left for the caller to unlink.
    pub fn delete_user(&self, id: i64) -> Result<Option<Vec<String>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let paths = {
                let mut stmt = tx.prepare("SELECT filepath FROM documents WHERE user_id = ?1")?;
                let paths = stmt
                    .query_map([id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                paths
            };
            let changed = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok((changed > 0).then_some(paths))
        })
    }

    // -- Documents --

    pub fn insert_document(&self, doc: &NewDocument<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents
                    (user_id, filename, original_filename, filepath, file_size, mime_type, upload_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    doc.user_id,
                    doc.filename,
                    doc.original_filename,
                    doc.filepath,
                    doc.file_size,
                    doc.mime_type,
                    now_timestamp(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_document(&self, id: i64) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{DOCUMENT_SELECT} WHERE d.id = ?1");
            conn.query_row(&sql, [id], document_from_row).optional()
        })
    }

    /// Documents of one owner, or every document when `owner_id` is `None`.
    /// Newest upload first.
    pub fn list_documents(&self, owner_id: Option<i64>) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{DOCUMENT_SELECT}
                 WHERE ?1 IS NULL OR d.user_id = ?1
                 ORDER BY d.upload_date DESC, d.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], document_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_document(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM documents WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        subject: &str,
        content: &str,
        message_type: MessageType,
        priority: Priority,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages
                    (sender_id, receiver_id, subject, content, message_type, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sender_id,
                    receiver_id,
                    subject,
                    content,
                    message_type.as_str(),
                    priority.as_str(),
                    now_timestamp(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Fans a broadcast out as one row per `user`-role account, in a single
    /// transaction. Returns the number of recipients.
    pub fn insert_broadcast(
        &self,
        sender_id: i64,
        subject: &str,
        content: &str,
        priority: Priority,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let recipients: Vec<i64> = {
                let mut stmt = tx.prepare("SELECT id FROM users WHERE role = ?1 ORDER BY id")?;
                let ids = stmt
                    .query_map([Role::User.as_str()], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };

            let now = now_timestamp();
            {
                let mut insert = tx.prepare(
                    "INSERT INTO messages
                        (sender_id, receiver_id, subject, content, message_type, priority, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for receiver_id in &recipients {
                    insert.execute(params![
                        sender_id,
                        receiver_id,
                        subject,
                        content,
                        MessageType::AdminBroadcast.as_str(),
                        priority.as_str(),
                        now,
                    ])?;
                }
            }
            tx.commit()?;

            Ok(recipients.len())
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            conn.query_row(&sql, [id], message_from_row).optional()
        })
    }

    /// Flips `is_read` and stamps `read_at` on the first call only.
    /// Returns whether this call made the transition.
    pub fn mark_message_read(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1, read_at = ?2 WHERE id = ?1 AND is_read = 0",
                params![id, now_timestamp()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Received messages, newest first, plus the unpaged total.
    pub fn list_inbox(
        &self,
        receiver_id: i64,
        unread_only: bool,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<MessageRow>, u64)> {
        self.with_conn(|conn| {
            let filter = "WHERE m.receiver_id = ?1 AND (?2 = 0 OR m.is_read = 0)";
            let total = count_messages(conn, filter, params![receiver_id, unread_only])?;
            let rows = query_messages(
                conn,
                filter,
                params![receiver_id, unread_only, limit, offset],
            )?;
            Ok((rows, total))
        })
    }

    /// Sent messages, newest first, plus the unpaged total.
    pub fn list_sent(
        &self,
        sender_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<MessageRow>, u64)> {
        self.with_conn(|conn| {
            let filter = "WHERE m.sender_id = ?1";
            let total = count_messages(conn, filter, params![sender_id])?;
            let rows = query_messages(conn, filter, params![sender_id, limit, offset])?;
            Ok((rows, total))
        })
    }

    /// Every message in the system, for the admin dashboard.
    pub fn list_messages(
        &self,
        filter: MessageFilter<'_>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<MessageRow>, u64)> {
        self.with_conn(|conn| {
            let clause = "WHERE (?1 = 0 OR m.is_read = 0) AND (?2 IS NULL OR m.priority = ?2)";
            let total = count_messages(conn, clause, params![filter.unread_only, filter.priority])?;
            let rows = query_messages(
                conn,
                clause,
                params![filter.unread_only, filter.priority, limit, offset],
            )?;
            Ok((rows, total))
        })
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

/// Runs a paged message query. `filter` binds its own parameters first;
/// LIMIT and OFFSET are the last two values of `params`.
fn query_messages(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<MessageRow>> {
    let n = params.len();
    let sql = format!(
        "{MESSAGE_SELECT} {filter} {MESSAGE_ORDER} LIMIT ?{} OFFSET ?{}",
        n - 1,
        n
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn count_messages(conn: &Connection, filter: &str, params: &[&dyn rusqlite::ToSql]) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM messages m {filter}");
    let count: i64 = conn.query_row(&sql, params, |row| row.get(0))?;
    Ok(count as u64)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Reads a LEFT JOINed user starting at column `at`; `None` when the join missed.
fn party_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Option<PartyRow>> {
    let Some(id) = row.get::<_, Option<i64>>(at)? else {
        return Ok(None);
    };
    Ok(Some(PartyRow {
        id,
        name: row.get(at + 1)?,
        email: row.get(at + 2)?,
        role: row.get(at + 3)?,
    }))
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        filename: row.get(2)?,
        original_filename: row.get(3)?,
        filepath: row.get(4)?,
        file_size: row.get(5)?,
        mime_type: row.get(6)?,
        upload_date: row.get(7)?,
        owner: party_at(row, 8)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        subject: row.get(3)?,
        content: row.get(4)?,
        is_read: row.get(5)?,
        message_type: row.get(6)?,
        priority: row.get(7)?,
        created_at: row.get(8)?,
        read_at: row.get(9)?,
        sender: party_at(row, 10)?,
        receiver: party_at(row, 14)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
