use tracing::{info, instrument, warn};

use crate::error::{Result, ToolError};
use crate::model::Recital;
use crate::workbook::{Batch, CellValue, TableSnapshot, WorkbookHost};

/// Number of performance-history columns kept per composition.
pub const HISTORY_DEPTH: usize = 4;

/// Outcome of a date propagation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropagationSummary {
    pub updated: usize,
    /// Composition ids that have no row in the repertoire table.
    pub missing: Vec<i64>,
}

/// Records each recital's date against the compositions it performs.
///
/// For every composition the performance-history columns starting at
/// `date_column` receive the recital date followed by the three dates that
/// were there before. The table is re-read before every recital so
/// successive recitals push older dates further right.
#[instrument(level = "info", skip_all, fields(table = %table, date_column = date_column))]
pub fn update_performance_dates(
    host: &mut impl WorkbookHost,
    table: &str,
    date_column: usize,
    recitals: &[Recital],
) -> Result<PropagationSummary> {
    let mut summary = PropagationSummary::default();

    for recital in recitals {
        let snapshot = host.read_table(table)?;
        check_columns(&snapshot, date_column)?;

        let mut batch = Batch::new();
        for composition in &recital.repertoire {
            let Some(row_index) = find_row(&snapshot, composition.id) else {
                warn!(
                    id = composition.id,
                    title = %composition.title,
                    "composition not found in repertoire table, date not recorded"
                );
                summary.missing.push(composition.id);
                continue;
            };

            let row = &snapshot.rows[row_index];
            let mut values = Vec::with_capacity(HISTORY_DEPTH);
            values.push(CellValue::Number(recital.date_stamp));
            values.extend(
                (date_column..date_column + HISTORY_DEPTH - 1)
                    .map(|col| row.get(col).cloned().unwrap_or_default()),
            );

            batch.write_values(
                &snapshot.sheet,
                snapshot.sheet_row(row_index),
                snapshot.sheet_col(date_column),
                vec![values],
            );
            summary.updated += 1;
        }

        host.sync(batch)?;
    }

    info!(
        updated = summary.updated,
        missing = summary.missing.len(),
        "performance dates updated"
    );
    Ok(summary)
}

/// First body row, top to bottom, whose first column holds the number `id`.
/// Ids stored as text do not match.
pub fn find_row(snapshot: &TableSnapshot, id: i64) -> Option<usize> {
    snapshot.rows.iter().position(|row| {
        matches!(row.first(), Some(CellValue::Number(value)) if *value == id as f64)
    })
}

fn check_columns(snapshot: &TableSnapshot, date_column: usize) -> Result<()> {
    if date_column + HISTORY_DEPTH > usize::from(snapshot.body.width) {
        return Err(ToolError::InvalidWorkbook(format!(
            "table '{}' has {} columns, date column {date_column} needs {HISTORY_DEPTH} more",
            snapshot.name, snapshot.body.width
        )));
    }
    Ok(())
}
