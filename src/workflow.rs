use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::collection::build_recitals;
use crate::config::{WorkbookLayout, WorkflowOptions};
use crate::error::Result;
use crate::filter::{FilterTarget, apply_order_filter};
use crate::io::{excel_read, excel_write};
use crate::model::Recital;
use crate::report::{
    LogEntry, PropagationSummary, append_recital_history, append_workflow_log,
    restore_history_formatting, update_performance_dates,
};
use crate::workbook::{Workbook, WorkbookHost};

/// What a workflow run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowReport {
    pub recitals: Vec<Recital>,
    /// `None` when date propagation is switched off.
    pub dates: Option<PropagationSummary>,
    /// Number of history blocks appended, `None` when switched off.
    pub history_blocks: Option<usize>,
    pub log: LogEntry,
}

/// Runs build → propagate dates → append history → append log against
/// `host`. The first failing stage stops the run; earlier stages are not
/// rolled back.
#[instrument(level = "info", skip_all, fields(%run_date))]
pub fn run_workflow(
    host: &mut impl WorkbookHost,
    layout: &WorkbookLayout,
    run_date: NaiveDate,
) -> Result<WorkflowReport> {
    info!("starting workflow");
    let options = WorkflowOptions::load(&*host)?;
    let recitals = build_recitals(&*host, &options)?;

    let dates = if options.update_dates {
        Some(update_performance_dates(
            host,
            &layout.repertoire_table,
            options.date_column,
            &recitals,
        )?)
    } else {
        None
    };

    let history_blocks = if options.add_to_history {
        Some(append_recital_history(host, &layout.history_sheet, &recitals)?)
    } else {
        None
    };

    let log = append_workflow_log(host, &layout.workflow_log_table, run_date, &recitals)?;
    info!("workflow complete");

    Ok(WorkflowReport {
        recitals,
        dates,
        history_blocks,
        log,
    })
}

/// Reads `input` and rebuilds the history block formatting that `.xlsx`
/// loading drops, so a later save keeps earlier blocks styled and merged.
pub fn load_workbook(input: &Path, layout: &WorkbookLayout) -> Result<Workbook> {
    let mut workbook = excel_read::read_workbook(input)?;
    restore_history_formatting(&mut workbook, &layout.history_sheet)?;
    Ok(workbook)
}

/// Loads `input`, runs the workflow and saves the result to `output`.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn run_workbook_file(
    input: &Path,
    output: &Path,
    run_date: NaiveDate,
) -> Result<WorkflowReport> {
    let layout = WorkbookLayout::default();
    let mut workbook = load_workbook(input, &layout)?;
    let report = run_workflow(&mut workbook, &layout, run_date)?;
    excel_write::write_workbook(output, &workbook)?;
    Ok(report)
}

/// Loads `input`, sets the repertoire order filter and saves to `output`.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display(), %target)
)]
pub fn filter_workbook_file(input: &Path, output: &Path, target: FilterTarget) -> Result<()> {
    let layout = WorkbookLayout::default();
    let mut workbook = load_workbook(input, &layout)?;
    apply_order_filter(&mut workbook, &layout.repertoire_table, target)?;
    excel_write::write_workbook(output, &workbook)
}

/// Reads the recitals planned in `input` without changing anything.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn read_recitals(input: &Path) -> Result<Vec<Recital>> {
    let workbook = excel_read::read_workbook(input)?;
    let options = WorkflowOptions::load(&workbook)?;
    build_recitals(&workbook, &options)
}
