use std::path::Path;

use rust_xlsxwriter::{FilterCondition, Format, FormatAlign, FormatBorder, Table, Worksheet};
use tracing::{debug, warn};

use crate::error::{Result, ToolError};
use crate::workbook::{Align, Area, CellStyle, CellValue, Sheet, Workbook, WorkbookHost};

/// Writes the provided workbook to the given path, including styles, merges,
/// defined names, table objects and active table filters.
pub fn write_workbook(path: &Path, workbook: &Workbook) -> Result<()> {
    let mut workbook_writer = rust_xlsxwriter::Workbook::new();

    for sheet in workbook.sheets() {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        write_sheet(worksheet, sheet)?;
        write_tables(worksheet, workbook, &sheet.name)?;
        write_filters(worksheet, workbook, &sheet.name)?;
    }

    for (name, defined) in workbook.defined_names() {
        workbook_writer.define_name(name, &format!("={}", defined.reference()))?;
    }

    workbook_writer.save(path)?;
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<()> {
    for merge in &sheet.merges {
        let anchor = sheet.cell(merge.row, merge.col).cloned().unwrap_or_default();
        let format = to_format(&anchor.style);
        worksheet.merge_range(
            merge.row,
            merge.col,
            merge.last_row(),
            merge.last_col(),
            "",
            &format,
        )?;
    }

    for (&(row, col), cell) in &sheet.cells {
        if is_hidden_by_merge(&sheet.merges, row, col) {
            continue;
        }
        let format = to_format(&cell.style);
        match &cell.value {
            CellValue::Empty => {
                if !cell.style.is_default() {
                    worksheet.write_blank(row, col, &format)?;
                }
            }
            CellValue::Text(value) => {
                worksheet.write_string_with_format(row, col, value, &format)?;
            }
            CellValue::Number(value) => {
                worksheet.write_number_with_format(row, col, *value, &format)?;
            }
            CellValue::Bool(value) => {
                worksheet.write_boolean_with_format(row, col, *value, &format)?;
            }
            CellValue::Formula(formula) => {
                worksheet.write_formula_with_format(row, col, formula.as_str(), &format)?;
            }
        }
    }
    Ok(())
}

/// Adds the Excel table objects of `sheet`. Header labels come from the
/// cells already written above each body.
fn write_tables(worksheet: &mut Worksheet, workbook: &Workbook, sheet: &str) -> Result<()> {
    for (name, defined) in workbook.tables() {
        if defined.sheet != sheet {
            continue;
        }
        let body = defined.area;
        let header_row = body.row.checked_sub(1).ok_or_else(|| {
            ToolError::InvalidWorkbook(format!("table '{name}' has no room for a header row"))
        })?;

        let mut table = Table::new();
        table.set_name(name.as_str()).set_autofilter(true);
        worksheet.add_table(header_row, body.col, body.last_row(), body.last_col(), &table)?;
        debug!(%name, rows = body.height, "table written");
    }
    Ok(())
}

/// Filters on table objects are saved as hidden rows. A worksheet holds a
/// single autofilter, so only the first filtered defined-name table of each
/// sheet keeps its filter criteria.
fn write_filters(worksheet: &mut Worksheet, workbook: &Workbook, sheet: &str) -> Result<()> {
    let mut written = false;
    for table in workbook.filtered_tables() {
        let snapshot = workbook.read_table(table)?;
        if snapshot.sheet != sheet {
            continue;
        }
        if workbook.is_excel_table(table) {
            let visible = workbook.visible_table_rows(table)?;
            for index in (0..snapshot.rows.len()).filter(|index| !visible.contains(index)) {
                worksheet.set_row_hidden(snapshot.sheet_row(index))?;
            }
            debug!(%table, hidden = snapshot.rows.len() - visible.len(), "table rows hidden");
            continue;
        }
        if written {
            warn!(%table, %sheet, "sheet already has an autofilter, table filter not saved");
            continue;
        }
        let Some(filters) = workbook.table_filters(table) else {
            continue;
        };

        let body = snapshot.body;
        worksheet.autofilter(body.row - 1, body.col, body.last_row(), body.last_col())?;
        for (column, values) in filters {
            let offset = snapshot.column_index(column).ok_or_else(|| {
                ToolError::InvalidWorkbook(format!("table '{table}' has no column '{column}'"))
            })?;
            let mut condition = FilterCondition::new();
            for value in values {
                condition = condition.add_list_filter(value.as_str());
            }
            worksheet.filter_column(snapshot.sheet_col(offset), &condition)?;
        }
        debug!(%table, filters = filters.len(), "table filter written");
        written = true;
    }
    Ok(())
}

fn is_hidden_by_merge(merges: &[Area], row: u32, col: u16) -> bool {
    merges
        .iter()
        .any(|merge| merge.contains(row, col) && (merge.row, merge.col) != (row, col))
}

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();
    if style.bold == Some(true) {
        format = format.set_bold();
    }
    if let Some(size) = style.font_size {
        format = format.set_font_size(size);
    }
    if let Some(color) = style.font_color {
        format = format.set_font_color(color);
    }
    if let Some(color) = style.fill {
        format = format.set_background_color(color);
    }
    if let Some(align) = style.align {
        format = format.set_align(match align {
            Align::Center => FormatAlign::Center,
            Align::Right => FormatAlign::Right,
        });
    }
    if style.borders.top {
        format = format.set_border_top(FormatBorder::Thin);
    }
    if style.borders.bottom {
        format = format.set_border_bottom(FormatBorder::Thin);
    }
    if style.borders.left {
        format = format.set_border_left(FormatBorder::Thin);
    }
    if style.borders.right {
        format = format.set_border_right(FormatBorder::Thin);
    }
    if let Some(num_format) = &style.num_format {
        format = format.set_num_format(num_format);
    }
    format
}
