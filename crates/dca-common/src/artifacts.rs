use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::plan::OrderPlan;

pub const LOG_HEADER: [&str; 4] = ["time", "order_price", "amount", "current_price"];

/// One row of the purchase log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub time: String,
    pub order_price: u64,
    pub amount: f64,
    pub current_price: f64,
}

impl LogRecord {
    pub fn from_plan(plan: &OrderPlan, ltp: f64, time: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            order_price: plan.price,
            amount: plan.size,
            current_price: ltp,
        }
    }

    fn to_row(&self) -> [String; 4] {
        [
            self.time.clone(),
            self.order_price.to_string(),
            self.amount.to_string(),
            self.current_price.to_string(),
        ]
    }
}

/// Append-only CSV log with one row per purchase run.
#[derive(Debug, Clone)]
pub struct PurchaseLog {
    path: PathBuf,
}

impl PurchaseLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record`, writing the header first if the file is new or empty.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open purchase log {}", self.path.display()))?;
        let is_new = file
            .metadata()
            .with_context(|| format!("failed to stat purchase log {}", self.path.display()))?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(LOG_HEADER)?;
        }
        writer.write_record(record.to_row())?;
        writer
            .flush()
            .with_context(|| format!("failed to flush purchase log {}", self.path.display()))?;
        Ok(())
    }
}

/// Replaces `path` with one CSV row per execution record.
///
/// Columns are the union of keys across `records`, in first-seen order.
/// Returns the number of data rows written.
pub fn write_trade_history<P: AsRef<Path>>(
    path: P,
    records: &[Map<String, Value>],
) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create export directory {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    let columns = collect_columns(records);
    if !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for record in records {
        writer.write_record(columns.iter().map(|column| cell_text(record.get(*column))))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(records.len())
}

fn collect_columns(records: &[Map<String, Value>]) -> Vec<&str> {
    let mut columns = IndexSet::new();
    for record in records {
        columns.extend(record.keys().map(String::as_str));
    }
    columns.into_iter().collect()
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(time: &str) -> LogRecord {
        LogRecord {
            time: time.to_string(),
            order_price: 1_230_000,
            amount: 0.02,
            current_price: 1_234_567.0,
        }
    }

    fn executions(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn first_append_writes_header_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let log = PurchaseLog::new(dir.path().join("nested").join("log.csv"));
        log.append(&record("2024-01-01 09:00:00")).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "time,order_price,amount,current_price",
                "2024-01-01 09:00:00,1230000,0.02,1234567",
            ]
        );
    }

    #[test]
    fn later_appends_add_one_row_and_keep_prior_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = PurchaseLog::new(dir.path().join("log.csv"));
        log.append(&record("2024-01-01 09:00:00")).unwrap();
        let before = fs::read_to_string(log.path()).unwrap();

        log.append(&record("2024-01-02 09:00:00")).unwrap();
        let after = fs::read_to_string(log.path()).unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(after.lines().count(), 3);
        assert_eq!(
            after.lines().last(),
            Some("2024-01-02 09:00:00,1230000,0.02,1234567")
        );
    }

    #[test]
    fn empty_existing_file_gets_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        File::create(&path).unwrap();

        PurchaseLog::new(&path)
            .append(&record("2024-01-01 09:00:00"))
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("time,"));
    }

    #[test]
    fn record_from_plan_copies_price_and_size() {
        let plan = crate::plan::OrderPlanner::new(Default::default())
            .unwrap()
            .plan(1_230_000.0)
            .unwrap();
        let record = LogRecord::from_plan(&plan, 1_230_000.0, "t");
        assert_eq!(record.order_price, 1_228_000);
        assert_eq!(record.amount, 0.02);
        assert_eq!(record.current_price, 1_230_000.0);
    }

    #[test]
    fn export_overwrites_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trade_history.csv");

        let first = executions(json!([
            {"id": 1, "side": "BUY", "price": 1230000.0, "size": 0.02},
            {"id": 2, "side": "BUY", "price": 1228000.0, "size": 0.02},
            {"id": 3, "side": "SELL", "price": 1300000.0, "size": 0.01}
        ]));
        assert_eq!(write_trade_history(&path, &first).unwrap(), 3);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 4);

        let second = executions(json!([
            {"id": 4, "side": "BUY", "price": 1225000.0, "size": 0.02},
            {"id": 5, "side": "BUY", "price": 1220000.0, "size": 0.02}
        ]));
        assert_eq!(write_trade_history(&path, &second).unwrap(), 2);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(!content.contains("SELL"));
    }

    #[test]
    fn export_columns_are_union_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trade_history.csv");
        let records = executions(json!([
            {"id": 1, "child_order_id": "JOR1", "commission": 0},
            {"id": 2, "exec_date": "2024-01-01T00:00:00", "child_order_id": null}
        ]));
        write_trade_history(&path, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,child_order_id,commission,exec_date");
        assert_eq!(lines[1], "1,JOR1,0,");
        assert_eq!(lines[2], "2,,,2024-01-01T00:00:00");
    }

    #[test]
    fn export_of_no_records_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trade_history.csv");
        fs::write(&path, "stale\n").unwrap();

        assert_eq!(write_trade_history(&path, &[]).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
