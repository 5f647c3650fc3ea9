use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::Result;
use crate::model::Recital;
use crate::model::date::{iso_date, month_day};
use crate::workbook::{Batch, CellValue, WorkbookHost};

/// Audit record stored in the workflow log; every run can be rebuilt from it.
#[derive(Debug, Serialize)]
pub struct WorkflowRecord<'a> {
    pub date: String,
    pub recitals: &'a [Recital],
}

/// Row inserted at the top of the workflow log table.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub run_date: String,
    pub recital_dates: String,
    pub json: String,
}

impl LogEntry {
    pub fn new(run_date: NaiveDate, recitals: &[Recital]) -> Result<Self> {
        let run_date = iso_date(run_date);
        let json = serde_json::to_string(&WorkflowRecord {
            date: run_date.clone(),
            recitals,
        })?;
        Ok(Self {
            run_date,
            recital_dates: recital_dates_summary(recitals),
            json,
        })
    }

    pub fn row(&self) -> Vec<CellValue> {
        vec![
            self.run_date.clone().into(),
            self.recital_dates.clone().into(),
            self.json.clone().into(),
            "".into(),
        ]
    }
}

/// `11/4, 11/11` in recital order.
pub fn recital_dates_summary(recitals: &[Recital]) -> String {
    recitals
        .iter()
        .map(|recital| month_day(recital.date.date()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[instrument(level = "info", skip_all, fields(table = %table, %run_date))]
pub fn append_workflow_log(
    host: &mut impl WorkbookHost,
    table: &str,
    run_date: NaiveDate,
    recitals: &[Recital],
) -> Result<LogEntry> {
    let entry = LogEntry::new(run_date, recitals)?;

    let mut batch = Batch::new();
    batch.insert_table_row(table, 0, entry.row());
    host.sync(batch)?;

    info!(bytes = entry.json.len(), "workflow log updated");
    Ok(entry)
}
