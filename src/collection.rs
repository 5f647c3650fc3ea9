use tracing::{debug, info, instrument};

use crate::config::{RecitalFields, WorkflowOptions, first_cell};
use crate::error::{Result, ToolError};
use crate::model::{Composition, Recital};
use crate::workbook::{CellValue, WorkbookHost};

/// Raw values of one recital slot on the planning sheet.
#[derive(Debug, Clone, PartialEq)]
struct RecitalSlot {
    index: u32,
    fields: RecitalFields,
    date: CellValue,
    venue12: CellValue,
    venue2: CellValue,
    block: Vec<Vec<CellValue>>,
}

/// Builds the recitals of every planning slot that has a date, in slot
/// order.
#[instrument(level = "info", skip_all, fields(recital_count = options.recital_count))]
pub fn build_recitals(host: &impl WorkbookHost, options: &WorkflowOptions) -> Result<Vec<Recital>> {
    let slots = (1..=options.recital_count)
        .map(|index| read_slot(host, options, index))
        .collect::<Result<Vec<_>>>()?;

    let mut recitals = Vec::new();
    for slot in slots {
        if slot.date.is_empty() {
            debug!(index = slot.index, "no date, skipping recital slot");
            continue;
        }
        recitals.push(build_recital(&slot, &options.performer)?);
    }

    info!(recitals = recitals.len(), "{} recitals found", recitals.len());
    Ok(recitals)
}

fn read_slot(
    host: &impl WorkbookHost,
    options: &WorkflowOptions,
    index: u32,
) -> Result<RecitalSlot> {
    let fields = options.templates.resolve(index);
    Ok(RecitalSlot {
        index,
        block: host.read_named_range(&fields.repertoire)?,
        date: first_cell(host, &fields.date)?,
        venue12: first_cell(host, &fields.venue12)?,
        venue2: first_cell(host, &fields.venue2)?,
        fields,
    })
}

fn build_recital(slot: &RecitalSlot, performer: &str) -> Result<Recital> {
    let date_stamp = slot.date.as_f64().ok_or_else(|| ToolError::InvalidCell {
        location: slot.fields.date.clone(),
        reason: format!("'{}' is not a date", slot.date.display()),
    })?;

    let mut repertoire = Vec::new();
    for (row_index, row) in slot.block.iter().enumerate() {
        let location = format!("{} row {}", slot.fields.repertoire, row_index + 1);
        if let Some(composition) = Composition::from_row(row, &location)? {
            repertoire.push(composition);
        }
    }

    debug!(
        index = slot.index,
        compositions = repertoire.len(),
        "recital slot read"
    );
    Recital::new(
        date_stamp,
        performer,
        slot.venue12.display(),
        slot.venue2.display(),
        repertoire,
    )
}
