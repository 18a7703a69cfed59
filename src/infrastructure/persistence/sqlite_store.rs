use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::entities::alarm::{Alarm, NewAlarm};
use crate::domain::entities::enclosure::Enclosure;
use crate::domain::entities::recipient::Recipient;
use crate::domain::entities::sample::{NewSample, Sample};
use crate::domain::entities::threshold_rule::ThresholdRule;
use crate::domain::ports::store::{
    AlarmLedger, EnclosureDirectory, RecipientDirectory, RecordedAlarm, RuleStore, SampleStore,
    StoreError,
};
use crate::domain::value_objects::alarm_status::AlarmStatus;
use crate::domain::value_objects::comparison::ComparisonOperator;

use super::migrations;

/// SQLite-backed store implementing every persistence port.
///
/// All access goes through one connection behind a mutex, which also
/// serializes concurrent ledger writes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Expands `~`, creates parent directories, sets WAL mode and pragmas,
    /// and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the database cannot be opened or initialized.
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let expanded = shellexpand::tilde(path);
        let db_path = PathBuf::from(expanded.as_ref());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }

        let conn =
            Connection::open(&db_path).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        migrations::initialize_schema(&conn).map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        tracing::debug!(path = %db_path.display(), "database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))
    }

    fn write_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))
    }

    /// Register a monitored enclosure.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the insert fails.
    pub fn add_enclosure(&self, name: &str, location: &str) -> Result<Enclosure, StoreError> {
        let conn = self.write_conn()?;
        conn.execute(
            "INSERT INTO enclosures (name, location) VALUES (?1, ?2)",
            params![name, location],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let id = conn.last_insert_rowid();
        drop(conn);

        Ok(Enclosure {
            id,
            name: name.to_string(),
            location: location.to_string(),
        })
    }

    /// Attach a threshold rule to an enclosure.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the insert fails, for example
    /// when the enclosure does not exist.
    pub fn add_rule(
        &self,
        enclosure_id: i64,
        operator: ComparisonOperator,
        threshold: f64,
        created_by: Option<i64>,
    ) -> Result<ThresholdRule, StoreError> {
        let conn = self.write_conn()?;
        conn.execute(
            "INSERT INTO threshold_rules (enclosure_id, operator, threshold, created_by) \
             VALUES (?1, ?2, ?3, ?4)",
            params![enclosure_id, operator.symbol(), threshold, created_by],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let id = conn.last_insert_rowid();
        drop(conn);

        Ok(ThresholdRule {
            id,
            enclosure_id,
            operator,
            threshold,
            created_by,
        })
    }

    /// Add a notification recipient.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the insert fails, including when
    /// the address is already registered.
    pub fn add_recipient(
        &self,
        address: &str,
        receive_notifications: bool,
    ) -> Result<Recipient, StoreError> {
        let conn = self.write_conn()?;
        conn.execute(
            "INSERT INTO recipients (address, receive_notifications) VALUES (?1, ?2)",
            params![address, receive_notifications],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let id = conn.last_insert_rowid();
        drop(conn);

        Ok(Recipient {
            id,
            address: address.to_string(),
            receive_notifications,
        })
    }

    /// Make sure `address` exists and is opted in, creating it if needed.
    /// Used to seed the administrator at startup.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WriteFailed` if the upsert fails.
    pub fn ensure_recipient(&self, address: &str) -> Result<Recipient, StoreError> {
        let conn = self.write_conn()?;
        let recipient = conn
            .query_row(
                "INSERT INTO recipients (address, receive_notifications) VALUES (?1, 1) \
                 ON CONFLICT(address) DO UPDATE SET receive_notifications = 1 \
                 RETURNING id, address, receive_notifications",
                params![address],
                parse_recipient_row,
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        drop(conn);
        Ok(recipient)
    }
}

fn parse_timestamp(raw: &str, column: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_enclosure_row(row: &rusqlite::Row<'_>) -> Result<Enclosure, rusqlite::Error> {
    Ok(Enclosure {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
    })
}

fn parse_rule_row(row: &rusqlite::Row<'_>) -> Result<ThresholdRule, rusqlite::Error> {
    let operator: String = row.get(2)?;
    let operator: ComparisonOperator = operator
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(ThresholdRule {
        id: row.get(0)?,
        enclosure_id: row.get(1)?,
        operator,
        threshold: row.get(3)?,
        created_by: row.get(4)?,
    })
}

fn parse_recipient_row(row: &rusqlite::Row<'_>) -> Result<Recipient, rusqlite::Error> {
    Ok(Recipient {
        id: row.get(0)?,
        address: row.get(1)?,
        receive_notifications: row.get(2)?,
    })
}

fn parse_alarm_row(row: &rusqlite::Row<'_>) -> Result<Alarm, rusqlite::Error> {
    let triggered_at: String = row.get(4)?;
    let status: String = row.get(5)?;
    let status: AlarmStatus = status
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;

    Ok(Alarm {
        id: row.get(0)?,
        enclosure_id: row.get(1)?,
        sample_id: row.get(2)?,
        rule_id: row.get(3)?,
        triggered_at: parse_timestamp(&triggered_at, 4)?,
        status,
        delivered: row.get(6)?,
    })
}

const ALARM_COLUMNS: &str =
    "id, enclosure_id, sample_id, rule_id, triggered_at, status, delivered";

impl EnclosureDirectory for SqliteStore {
    fn get_enclosure(&self, id: i64) -> Result<Option<Enclosure>, StoreError> {
        let conn = self.read_conn()?;
        let enclosure = conn
            .query_row(
                "SELECT id, name, location FROM enclosures WHERE id = ?1",
                params![id],
                parse_enclosure_row,
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        drop(conn);
        Ok(enclosure)
    }
}

impl RuleStore for SqliteStore {
    fn rules_for(&self, enclosure_id: i64) -> Result<Vec<ThresholdRule>, StoreError> {
        let conn = self.read_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, enclosure_id, operator, threshold, created_by \
                 FROM threshold_rules WHERE enclosure_id = ?1 ORDER BY id",
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![enclosure_id], parse_rule_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        // A row that does not parse is skipped so the remaining rules still run.
        let mut rules = Vec::new();
        for row in rows {
            match row {
                Ok(rule) => rules.push(rule),
                Err(rusqlite::Error::FromSqlConversionFailure(_, _, e)) => {
                    tracing::warn!(enclosure_id, "skipping unreadable threshold rule: {e}");
                }
                Err(e) => return Err(StoreError::ReadFailed(e.to_string())),
            }
        }

        drop(stmt);
        drop(conn);
        Ok(rules)
    }
}

impl RecipientDirectory for SqliteStore {
    fn opted_in_recipients(&self) -> Result<Vec<Recipient>, StoreError> {
        let conn = self.read_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, address, receive_notifications FROM recipients \
                 WHERE receive_notifications = 1 ORDER BY id",
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let recipients = stmt
            .query_map([], parse_recipient_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(stmt);
        drop(conn);
        Ok(recipients)
    }
}

impl SampleStore for SqliteStore {
    fn insert_sample(&self, sample: &NewSample) -> Result<Sample, StoreError> {
        let conn = self.write_conn()?;
        conn.execute(
            "INSERT INTO samples (enclosure_id, temperature, humidity, captured_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sample.enclosure_id,
                sample.temperature,
                sample.humidity,
                sample.captured_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let id = conn.last_insert_rowid();
        drop(conn);

        Ok(sample.clone().into_sample(id))
    }
}

impl AlarmLedger for SqliteStore {
    fn create_alarm(&self, alarm: &NewAlarm) -> Result<RecordedAlarm, StoreError> {
        let conn = self.write_conn()?;
        let inserted = conn
            .execute(
                "INSERT INTO alarms (enclosure_id, sample_id, rule_id, triggered_at, status, delivered) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 0) \
                 ON CONFLICT(sample_id, rule_id) DO NOTHING",
                params![
                    alarm.enclosure_id,
                    alarm.sample_id,
                    alarm.rule_id,
                    alarm.triggered_at.to_rfc3339(),
                    AlarmStatus::New.as_str(),
                ],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        let stored = conn
            .query_row(
                &format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE sample_id = ?1 AND rule_id = ?2"),
                params![alarm.sample_id, alarm.rule_id],
                parse_alarm_row,
            )
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        drop(conn);

        Ok(RecordedAlarm {
            alarm: stored,
            created: inserted == 1,
        })
    }

    fn mark_delivered(&self, alarm_id: i64) -> Result<(), StoreError> {
        let conn = self.write_conn()?;
        let matched = conn
            .execute(
                "UPDATE alarms SET delivered = 1 WHERE id = ?1",
                params![alarm_id],
            )
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        drop(conn);

        if matched == 0 {
            return Err(StoreError::NotFound(format!("alarm {alarm_id}")));
        }
        Ok(())
    }

    fn get_alarm(&self, alarm_id: i64) -> Result<Option<Alarm>, StoreError> {
        let conn = self.read_conn()?;
        let alarm = conn
            .query_row(
                &format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"),
                params![alarm_id],
                parse_alarm_row,
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        drop(conn);
        Ok(alarm)
    }

    fn alarms_for_sample(&self, sample_id: i64) -> Result<Vec<Alarm>, StoreError> {
        let conn = self.read_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms WHERE sample_id = ?1 ORDER BY id"
            ))
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let alarms = stmt
            .query_map(params![sample_id], parse_alarm_row)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        drop(stmt);
        drop(conn);
        Ok(alarms)
    }
}
