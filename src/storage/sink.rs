//! SQLite-backed record sink
//!
//! One row per subject key with a nullable column per extracted field. The
//! masked identifier is dropped since the key already holds its digits.
//! An upsert writes the full field set, so a field missing from the latest
//! record is cleared.

use crate::scrape::ExtractedRecord;
use crate::storage::schema::{initialize_sink_schema, registrant_columns};
use crate::storage::sqlite::{open_connection, open_in_memory_connection};
use crate::storage::traits::{RecordSink, StorageError, StorageResult, StoredRegistrant};
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Registrant table keyed by subject key
pub struct SqliteRecordSink {
    conn: Mutex<Connection>,
}

impl SqliteRecordSink {
    /// Opens (or creates) the registrant table in the given database file
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = open_connection(path)?;
        Self::with_connection(conn)
    }

    /// Creates a sink in a private in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = open_in_memory_connection()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        initialize_sink_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn upsert_sql() -> String {
    let columns = registrant_columns();
    let placeholders: Vec<String> = (1..=columns.len() + 3).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    format!(
        "INSERT INTO registrants (subject_key, {}, created_at, updated_at) VALUES ({})
         ON CONFLICT(subject_key) DO UPDATE SET {}, updated_at = excluded.updated_at",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

fn select_sql(key_count: usize) -> String {
    let placeholders: Vec<String> = (1..=key_count).map(|i| format!("?{}", i)).collect();
    format!(
        "SELECT subject_key, {}, created_at, updated_at FROM registrants
         WHERE subject_key IN ({}) ORDER BY subject_key",
        registrant_columns().join(", "),
        placeholders.join(", ")
    )
}

fn row_to_registrant(row: &Row<'_>) -> rusqlite::Result<StoredRegistrant> {
    let columns = registrant_columns();
    let mut fields = ExtractedRecord::new();
    for (offset, name) in columns.iter().enumerate() {
        if let Some(value) = row.get::<_, Option<String>>(offset + 1)? {
            fields.insert(*name, value);
        }
    }

    Ok(StoredRegistrant {
        subject_key: row.get(0)?,
        fields,
        created_at: row.get(columns.len() + 1)?,
        updated_at: row.get(columns.len() + 2)?,
    })
}

impl RecordSink for SqliteRecordSink {
    fn upsert(&self, subject_key: &str, record: &ExtractedRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let columns = registrant_columns();

        let mut values: Vec<Option<String>> = Vec::with_capacity(columns.len() + 3);
        values.push(Some(subject_key.to_string()));
        values.extend(columns.iter().map(|name| record.get(name).map(str::to_string)));
        values.push(Some(now.clone()));
        values.push(Some(now));

        self.conn()?
            .execute(&upsert_sql(), params_from_iter(values.iter()))?;
        Ok(())
    }

    fn find_many(&self, subject_keys: &[String]) -> StorageResult<Vec<StoredRegistrant>> {
        if subject_keys.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&select_sql(subject_keys.len()))?;
        let rows = stmt.query_map(params_from_iter(subject_keys.iter()), row_to_registrant)?;

        let mut registrants = Vec::new();
        for row in rows {
            registrants.push(row?);
        }
        Ok(registrants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> ExtractedRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_upsert_then_find() {
        let sink = SqliteRecordSink::open_in_memory().unwrap();
        let fields = record(&[("razao_social", "ACME LTDA"), ("situacao_cadastral", "ATIVO")]);
        sink.upsert("00006486000175", &fields).unwrap();

        let found = sink.find_many(&["00006486000175".to_string()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].subject_key, "00006486000175");
        assert_eq!(found[0].fields, fields);
    }

    #[test]
    fn test_masked_identifier_is_not_stored() {
        let sink = SqliteRecordSink::open_in_memory().unwrap();
        let fields = record(&[("razao_social", "ACME LTDA"), ("cnpj", "00.006.486/0001-75")]);
        sink.upsert("00006486000175", &fields).unwrap();

        let found = sink.find_many(&["00006486000175".to_string()]).unwrap();
        assert_eq!(found[0].fields.get("razao_social"), Some("ACME LTDA"));
        assert!(!found[0].fields.contains("cnpj"));
    }

    #[test]
    fn test_upsert_replaces_full_field_set() {
        let sink = SqliteRecordSink::open_in_memory().unwrap();
        sink.upsert(
            "00006486000175",
            &record(&[("razao_social", "OLD NAME"), ("nome_fantasia", "OLD")]),
        )
        .unwrap();
        let first = sink.find_many(&["00006486000175".to_string()]).unwrap();

        sink.upsert("00006486000175", &record(&[("razao_social", "NEW NAME")]))
            .unwrap();
        let second = sink.find_many(&["00006486000175".to_string()]).unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].fields.get("razao_social"), Some("NEW NAME"));
        assert!(!second[0].fields.contains("nome_fantasia"));
        assert_eq!(second[0].created_at, first[0].created_at);
    }

    #[test]
    fn test_find_skips_unknown_keys() {
        let sink = SqliteRecordSink::open_in_memory().unwrap();
        sink.upsert("00006486000175", &record(&[("razao_social", "A")]))
            .unwrap();
        sink.upsert("11222333000181", &record(&[("razao_social", "B")]))
            .unwrap();

        let keys = vec![
            "11222333000181".to_string(),
            "33000167000101".to_string(),
            "00006486000175".to_string(),
        ];
        let found = sink.find_many(&keys).unwrap();
        let found_keys: Vec<&str> = found.iter().map(|r| r.subject_key.as_str()).collect();
        assert_eq!(found_keys, vec!["00006486000175", "11222333000181"]);
    }

    #[test]
    fn test_find_with_no_keys() {
        let sink = SqliteRecordSink::open_in_memory().unwrap();
        assert!(sink.find_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_sql_covers_every_field() {
        let sql = upsert_sql();
        for name in registrant_columns() {
            assert!(sql.contains(&format!("{0} = excluded.{0}", name)));
        }
        assert!(!sql.contains("created_at = excluded"));
    }
}
