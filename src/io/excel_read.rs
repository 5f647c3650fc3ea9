use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::{debug, warn};

use crate::error::{Result, ToolError};
use crate::workbook::reference::parse_reference;
use crate::workbook::{Area, CellValue, Sheet, Workbook};

/// Names Excel reserves for itself, such as autofilter ranges.
const BUILTIN_NAME_PREFIX: &str = "_xlnm.";

/// Loads cell values, formulas, defined names and table objects of an
/// `.xlsx` file into an in-memory [`Workbook`]. Cell formatting and merges
/// are not read.
pub fn read_workbook(path: &Path) -> Result<Workbook> {
    let mut source: Xlsx<_> = open_workbook(path)?;
    let mut workbook = Workbook::new();

    let sheet_names = source.sheet_names().to_owned();
    for sheet_name in &sheet_names {
        let sheet = workbook.add_sheet(sheet_name);
        ingest_values(&mut source, sheet)?;
        ingest_formulas(&mut source, sheet)?;
        debug!(sheet = %sheet_name, cells = sheet.cells.len(), "sheet loaded");
    }

    for (name, formula) in source.defined_names().to_vec() {
        if name.starts_with(BUILTIN_NAME_PREFIX) {
            continue;
        }
        match parse_reference(&formula) {
            Ok((sheet, area)) if workbook.sheet(&sheet).is_some() => {
                workbook.define_name(name, sheet, area);
            }
            Ok((sheet, _)) => {
                warn!(%name, %sheet, "defined name points at an unknown sheet, ignoring");
            }
            Err(error) => {
                debug!(%name, %formula, %error, "defined name is not a plain range, ignoring");
            }
        }
    }

    ingest_tables(&mut source, &mut workbook)?;
    Ok(workbook)
}

/// Registers every Excel table object with the area of its data rows.
fn ingest_tables<R: std::io::Read + std::io::Seek>(
    source: &mut Xlsx<R>,
    workbook: &mut Workbook,
) -> Result<()> {
    source.load_tables()?;
    let names: Vec<String> = source.table_names().into_iter().cloned().collect();

    for name in names {
        let Some(table) = source.table_by_name(&name) else {
            continue;
        };
        let table = table?;
        let data = table.data();
        let (Some((first_row, first_col)), Some((last_row, last_col))) = (data.start(), data.end())
        else {
            debug!(%name, "table has no data rows, ignoring");
            continue;
        };
        let body = Area::new(
            first_row,
            to_col(first_col as usize)?,
            last_row - first_row + 1,
            to_col((last_col - first_col + 1) as usize)?,
        );
        debug!(%name, sheet = %table.sheet_name(), rows = body.height, "table loaded");
        workbook.define_table(name, table.sheet_name(), body);
    }
    Ok(())
}

fn ingest_values<R: std::io::Read + std::io::Seek>(
    source: &mut Xlsx<R>,
    sheet: &mut Sheet,
) -> Result<()> {
    let range = source
        .worksheet_range(&sheet.name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{}'", sheet.name)))?
        .map_err(ToolError::from)?;

    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
    for (row, col, cell) in range.cells() {
        let value = cell_to_value(cell);
        if value.is_empty() {
            continue;
        }
        sheet.set_value(
            row_offset + row as u32,
            to_col(col_offset as usize + col)?,
            value,
        );
    }
    Ok(())
}

fn ingest_formulas<R: std::io::Read + std::io::Seek>(
    source: &mut Xlsx<R>,
    sheet: &mut Sheet,
) -> Result<()> {
    // Sheets without a formula part are fine.
    let Some(Ok(formulas)) = source.worksheet_formula(&sheet.name) else {
        return Ok(());
    };

    let (row_offset, col_offset) = formulas.start().unwrap_or((0, 0));
    for (row, col, formula) in formulas.cells() {
        if formula.trim().is_empty() {
            continue;
        }
        let formula = if formula.starts_with('=') {
            formula.clone()
        } else {
            format!("={formula}")
        };
        sheet.set_value(
            row_offset + row as u32,
            to_col(col_offset as usize + col)?,
            CellValue::Formula(formula),
        );
    }
    Ok(())
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) | DataType::DateTime(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

fn to_col(col: usize) -> Result<u16> {
    u16::try_from(col)
        .map_err(|_| ToolError::InvalidWorkbook(format!("column index {col} is out of range")))
}
