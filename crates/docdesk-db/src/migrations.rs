use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (users, documents, messages)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'user'
                            CHECK (role IN ('user', 'admin')),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE documents (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                filename            TEXT NOT NULL,
                original_filename   TEXT NOT NULL,
                filepath            TEXT NOT NULL,
                file_size           INTEGER NOT NULL,
                mime_type           TEXT NOT NULL,
                upload_date         TEXT NOT NULL
            );

            CREATE INDEX idx_documents_user
                ON documents(user_id, upload_date);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                subject         TEXT NOT NULL,
                content         TEXT NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0,
                message_type    TEXT NOT NULL DEFAULT 'user_to_admin'
                                CHECK (message_type IN ('user_to_admin', 'admin_to_user', 'admin_broadcast')),
                priority        TEXT NOT NULL DEFAULT 'medium'
                                CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
                created_at      TEXT NOT NULL,
                read_at         TEXT
            );

            CREATE INDEX idx_messages_receiver
                ON messages(receiver_id, created_at);

            CREATE INDEX idx_messages_sender
                ON messages(sender_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", LATEST_VERSION);
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}
