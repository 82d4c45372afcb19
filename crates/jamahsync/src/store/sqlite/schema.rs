//! SQL statements for the key-value table.

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
);
"#;

pub const SELECT_VALUE: &str = "SELECT value FROM kv WHERE key = ?1";

pub const UPSERT_VALUE: &str = r#"
INSERT INTO kv (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#;

pub const DELETE_VALUE: &str = "DELETE FROM kv WHERE key = ?1";
