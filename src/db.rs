use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::types::{ContactRecord, ReferenceRange, ReportRow};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use tracing::{info, warn};

/// Owns the single connection used for a run. Created at the entry point
/// and passed explicitly to each stage; the connection closes on drop.
pub struct DatabaseManager {
    conn: Connection,
    reference_table: String,
    contact_table: String,
    report_table: String,
}

impl DatabaseManager {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        info!("Opening SQLite database at {}", config.path.display());
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&config.path)?;
        Ok(Self::from_connection(conn, config))
    }

    pub fn from_connection(conn: Connection, config: &DatabaseConfig) -> Self {
        Self {
            conn,
            reference_table: config.reference_table.clone(),
            contact_table: config.contact_table.clone(),
            report_table: config.report_table.clone(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn report_table(&self) -> &str {
        &self.report_table
    }

    /// Load reference ranges keyed by test id. The first row for a test id
    /// wins; a stored range with min > max fails the load.
    pub fn load_reference_ranges(&self) -> Result<HashMap<String, ReferenceRange>> {
        let sql = format!(
            "SELECT id, name, kind, min_value, max_value FROM {}",
            self.reference_table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut ranges = HashMap::new();
        while let Some(row) = rows.next()? {
            let test_id = value_to_text(row.get::<_, Value>(0)?);
            let name = value_to_text(row.get::<_, Value>(1)?);
            let kind = value_to_text(row.get::<_, Value>(2)?);
            let min_value = optional_f64(row, 3)?;
            let max_value = optional_f64(row, 4)?;

            if ranges.contains_key(&test_id) {
                warn!("Duplicate reference range for test {}, keeping the first", test_id);
                continue;
            }
            let range = ReferenceRange::new(test_id.clone(), name, kind, min_value, max_value)?;
            ranges.insert(test_id, range);
        }

        info!("Loaded {} reference ranges from {}", ranges.len(), self.reference_table);
        Ok(ranges)
    }

    /// Load the contact directory keyed by patient id
    pub fn load_contacts(&self) -> Result<HashMap<String, Vec<ContactRecord>>> {
        let sql = format!("SELECT id, name, phone FROM {}", self.contact_table);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut contacts: HashMap<String, Vec<ContactRecord>> = HashMap::new();
        let mut total = 0;
        while let Some(row) = rows.next()? {
            let patient_id = value_to_text(row.get::<_, Value>(0)?);
            let record = ContactRecord {
                patient_id: patient_id.clone(),
                name: value_to_text(row.get::<_, Value>(1)?),
                phone: value_to_text(row.get::<_, Value>(2)?),
            };
            contacts.entry(patient_id).or_default().push(record);
            total += 1;
        }

        info!("Loaded {} contact records from {}", total, self.contact_table);
        Ok(contacts)
    }

    /// Create the report table if it does not exist yet
    pub fn ensure_report_table(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                phone VARCHAR(20),
                name VARCHAR(100),
                test_name VARCHAR(20),
                classification VARCHAR(50)
            );",
            self.report_table
        ))?;
        Ok(())
    }

    /// Append report rows in a single transaction. With `replace`, existing
    /// rows are deleted inside the same transaction first. Nothing is
    /// committed if any statement fails.
    pub fn write_report(&mut self, rows: &[ReportRow], replace: bool) -> Result<usize> {
        self.ensure_report_table()?;

        let tx = self.conn.transaction()?;
        if replace {
            let removed = tx.execute(&format!("DELETE FROM {}", self.report_table), [])?;
            info!("Removed {} existing rows from {}", removed, self.report_table);
        }
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (phone, name, test_name, classification) VALUES (?1, ?2, ?3, ?4)",
                self.report_table
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.phone,
                    row.name,
                    row.test_name,
                    row.classification.label()
                ])?;
            }
        }
        tx.commit()?;

        info!("Appended {} rows to {}", rows.len(), self.report_table);
        Ok(rows.len())
    }

    /// Delete every row of the report table, returning how many were removed
    pub fn clear_report(&self) -> Result<usize> {
        self.ensure_report_table()?;
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {}", self.report_table), [])?;
        Ok(removed)
    }

    /// Read the report table back, in insertion order
    pub fn read_report(&self) -> Result<Vec<ReportRow>> {
        let sql = format!(
            "SELECT phone, name, test_name, classification FROM {} ORDER BY rowid",
            self.report_table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut report = Vec::new();
        while let Some(row) = rows.next()? {
            let classification: String = row.get(3)?;
            report.push(ReportRow {
                phone: row.get(0)?,
                name: row.get(1)?,
                test_name: row.get(2)?,
                classification: classification.parse()?,
            });
        }
        Ok(report)
    }
}

/// Render an id or text cell as text regardless of its storage class
fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.trim().to_string(),
        Value::Blob(b) => String::from_utf8_lossy(&b).trim().to_string(),
    }
}

fn optional_f64(row: &Row<'_>, idx: usize) -> Result<Option<f64>> {
    let value = match row.get::<_, Value>(idx)? {
        Value::Integer(i) => Some(i as f64),
        Value::Real(f) => Some(f),
        Value::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        Value::Null | Value::Blob(_) => None,
    };
    Ok(value)
}
