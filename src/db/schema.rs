/// Bumped whenever `SCHEMA` gains something. Migrations are additive only.
pub const SCHEMA_VERSION: i64 = 1;

/// Both partitions share one table; `seq` gives insertion order and is kept
/// on upsert, so re-putting a key does not move it in enumeration.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    partition TEXT NOT NULL,
    key TEXT NOT NULL,
    value BLOB NOT NULL,
    stamp INTEGER,
    UNIQUE (partition, key)
);

CREATE INDEX IF NOT EXISTS idx_entries_partition_seq
    ON entries(partition, seq);
"#;
