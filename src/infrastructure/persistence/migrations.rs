use rusqlite::Connection;

/// Create the cabwatch tables if they don't exist yet.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS enclosures (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT    NOT NULL,
            location    TEXT    NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS recipients (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            address                TEXT    NOT NULL UNIQUE,
            receive_notifications  INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS samples (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            enclosure_id  INTEGER NOT NULL REFERENCES enclosures(id),
            temperature   REAL    NOT NULL,
            humidity      REAL    NOT NULL,
            captured_at   TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS threshold_rules (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            enclosure_id  INTEGER NOT NULL REFERENCES enclosures(id) ON DELETE CASCADE,
            operator      TEXT    NOT NULL CHECK (operator IN ('>', '<', '>=', '<=')),
            threshold     REAL    NOT NULL,
            created_by    INTEGER REFERENCES recipients(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS alarms (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            enclosure_id  INTEGER NOT NULL REFERENCES enclosures(id),
            sample_id     INTEGER NOT NULL REFERENCES samples(id),
            rule_id       INTEGER NOT NULL REFERENCES threshold_rules(id),
            triggered_at  TEXT    NOT NULL,
            status        TEXT    NOT NULL DEFAULT 'new',
            delivered     INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_samples_enclosure ON samples(enclosure_id, captured_at);
        CREATE INDEX IF NOT EXISTS idx_rules_enclosure ON threshold_rules(enclosure_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_alarms_sample_rule ON alarms(sample_id, rule_id);
        CREATE INDEX IF NOT EXISTS idx_alarms_undelivered ON alarms(delivered) WHERE delivered = 0;",
    )?;
    Ok(())
}
