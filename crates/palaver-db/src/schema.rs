pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session (
    slot INTEGER PRIMARY KEY CHECK (slot = 0),
    user_id TEXT NOT NULL,
    email TEXT NOT NULL,
    id_token TEXT,
    refresh_token TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
"#;
