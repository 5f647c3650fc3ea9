use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Result, ToolError};
use crate::workbook::reference::{cell_name, format_reference};
use crate::workbook::{
    Area, Batch, CellStyle, CellValue, TableSnapshot, WorkbookHost, WriteRequest,
};

/// A cell with its value and presentation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

/// Sparse worksheet keyed by zero-based `(row, column)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub cells: BTreeMap<(u32, u16), Cell>,
    pub merges: Vec<Area>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            merges: Vec::new(),
        }
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn value(&self, row: u32, col: u16) -> CellValue {
        self.cell(row, col)
            .map(|cell| cell.value.clone())
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, row: u32, col: u16, value: impl Into<CellValue>) {
        self.cells.entry((row, col)).or_default().value = value.into();
    }

    /// Writes a row-major block of values with its top-left corner at
    /// `(row, col)`.
    pub fn write_values(&mut self, row: u32, col: u16, values: &[Vec<CellValue>]) {
        for (row_offset, row_values) in values.iter().enumerate() {
            for (col_offset, value) in row_values.iter().enumerate() {
                self.set_value(
                    row + row_offset as u32,
                    col + col_offset as u16,
                    value.clone(),
                );
            }
        }
    }

    pub fn apply_style(&mut self, area: Area, style: &CellStyle) {
        for row in area.row..=area.last_row() {
            for col in area.col..=area.last_col() {
                self.cells.entry((row, col)).or_default().style.merge(style);
            }
        }
    }

    pub fn read_area(&self, area: Area) -> Vec<Vec<CellValue>> {
        (area.row..=area.last_row())
            .map(|row| {
                (area.col..=area.last_col())
                    .map(|col| self.value(row, col))
                    .collect()
            })
            .collect()
    }

    pub fn last_used_row(&self) -> Option<u32> {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.value.is_empty() || !cell.style.is_default())
            .map(|((row, _), _)| *row)
            .max()
    }

    /// Moves every cell, and every merge, within the columns of `span` that
    /// sits at or below `from_row` one row down.
    fn shift_down(&mut self, from_row: u32, span: Area) {
        let moved: Vec<(u32, u16)> = self
            .cells
            .keys()
            .filter(|&&(row, col)| row >= from_row && span.overlaps_columns(&Area::cell(0, col)))
            .copied()
            .collect();
        for (row, col) in moved.into_iter().rev() {
            if let Some(cell) = self.cells.remove(&(row, col)) {
                self.cells.insert((row + 1, col), cell);
            }
        }

        for merge in &mut self.merges {
            if merge.row >= from_row && merge.overlaps_columns(&span) {
                merge.row += 1;
            }
        }
    }
}

/// Workbook-scoped name pointing at an area of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedName {
    pub sheet: String,
    pub area: Area,
}

impl DefinedName {
    pub fn reference(&self) -> String {
        format_reference(&self.sheet, self.area)
    }
}

type ColumnFilters = BTreeMap<String, Vec<String>>;

/// In-memory workbook implementing [`WorkbookHost`].
///
/// A table is an Excel table object, or failing that a defined name, whose
/// area covers the table body. The header labels live in the row directly
/// above the body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    names: BTreeMap<String, DefinedName>,
    /// Excel table objects, keyed by table name, with their body area.
    tables: BTreeMap<String, DefinedName>,
    filters: BTreeMap<String, ColumnFilters>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sheet called `name`, creating it when missing.
    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        let index = match self.sheets.iter().position(|sheet| sheet.name == name) {
            Some(index) => index,
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| missing_sheet(name))
    }

    pub fn define_name(&mut self, name: impl Into<String>, sheet: impl Into<String>, area: Area) {
        self.names.insert(
            name.into(),
            DefinedName {
                sheet: sheet.into(),
                area,
            },
        );
    }

    pub fn defined_names(&self) -> impl Iterator<Item = (&String, &DefinedName)> {
        self.names.iter()
    }

    /// Registers an Excel table whose data rows cover `body`.
    pub fn define_table(&mut self, name: impl Into<String>, sheet: impl Into<String>, body: Area) {
        self.tables.insert(
            name.into(),
            DefinedName {
                sheet: sheet.into(),
                area: body,
            },
        );
    }

    pub fn tables(&self) -> impl Iterator<Item = (&String, &DefinedName)> {
        self.tables.iter()
    }

    pub fn is_excel_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Active column filters of `table`, keyed by header label.
    pub fn table_filters(&self, table: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.filters.get(table).filter(|filters| !filters.is_empty())
    }

    pub fn filtered_tables(&self) -> impl Iterator<Item = &String> {
        self.filters
            .iter()
            .filter(|(_, filters)| !filters.is_empty())
            .map(|(table, _)| table)
    }

    /// Zero-based body rows of `table` that pass every active filter.
    pub fn visible_table_rows(&self, table: &str) -> Result<Vec<usize>> {
        let snapshot = self.read_table(table)?;
        let filters = match self.table_filters(table) {
            Some(filters) => filters,
            None => return Ok((0..snapshot.rows.len()).collect()),
        };

        let mut criteria = Vec::with_capacity(filters.len());
        for (column, values) in filters {
            let index = column_of(&snapshot, column)?;
            criteria.push((index, values));
        }

        Ok(snapshot
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                criteria.iter().all(|(index, values)| {
                    let shown = row.get(*index).map(CellValue::display).unwrap_or_default();
                    values.iter().any(|value| *value == shown)
                })
            })
            .map(|(index, _)| index)
            .collect())
    }

    fn table_location(&self, table: &str) -> Result<&DefinedName> {
        let name = self
            .tables
            .get(table)
            .or_else(|| self.names.get(table))
            .ok_or_else(|| ToolError::MissingName(table.to_string()))?;
        if name.area.row == 0 {
            return Err(ToolError::InvalidWorkbook(format!(
                "table '{table}' has no room for a header row"
            )));
        }
        Ok(name)
    }

    fn apply(&mut self, request: WriteRequest) -> Result<()> {
        match request {
            WriteRequest::Values {
                sheet,
                row,
                col,
                values,
            } => {
                self.sheet_mut(&sheet)?.write_values(row, col, &values);
            }
            WriteRequest::Style { sheet, area, style } => {
                self.sheet_mut(&sheet)?.apply_style(area, &style);
            }
            WriteRequest::Merge { sheet, area } => {
                let sheet = self.sheet_mut(&sheet)?;
                if let Some(existing) = sheet.merges.iter().find(|merge| merge.intersects(&area)) {
                    return Err(ToolError::InvalidWorkbook(format!(
                        "merge {} overlaps existing merge {}",
                        cell_name(area.row, area.col),
                        cell_name(existing.row, existing.col)
                    )));
                }
                sheet.merges.push(area);
            }
            WriteRequest::InsertTableRow {
                table,
                position,
                values,
            } => self.insert_table_row(&table, position, values)?,
            WriteRequest::ClearFilter { table, column } => {
                self.check_filter_column(&table, &column)?;
                if let Some(filters) = self.filters.get_mut(&table) {
                    filters.remove(&column);
                }
            }
            WriteRequest::ApplyFilter {
                table,
                column,
                values,
            } => {
                self.check_filter_column(&table, &column)?;
                self.filters.entry(table).or_default().insert(column, values);
            }
        }
        Ok(())
    }

    fn insert_table_row(
        &mut self,
        table: &str,
        position: u32,
        values: Vec<CellValue>,
    ) -> Result<()> {
        let location = self.table_location(table)?.clone();
        if position > location.area.height {
            return Err(ToolError::InvalidWorkbook(format!(
                "row position {position} is outside table '{table}'"
            )));
        }
        if values.len() > usize::from(location.area.width) {
            return Err(ToolError::InvalidWorkbook(format!(
                "row of {} values does not fit table '{table}'",
                values.len()
            )));
        }

        let insert_at = location.area.row + position;
        let sheet = self.sheet_mut(&location.sheet)?;
        sheet.shift_down(insert_at, location.area);
        sheet.write_values(insert_at, location.area.col, &[values]);

        let excel_table = self.tables.contains_key(table);
        let grown = if excel_table { Some(table) } else { None };
        shift_names_below(&mut self.tables, grown, &location, insert_at);
        let grown = if excel_table { None } else { Some(table) };
        shift_names_below(&mut self.names, grown, &location, insert_at);
        Ok(())
    }

    fn check_filter_column(&self, table: &str, column: &str) -> Result<()> {
        let snapshot = self.read_table(table)?;
        column_of(&snapshot, column).map(|_| ())
    }
}

impl WorkbookHost for Workbook {
    fn read_named_range(&self, name: &str) -> Result<Vec<Vec<CellValue>>> {
        let defined = self
            .names
            .get(name)
            .ok_or_else(|| ToolError::MissingName(name.to_string()))?;
        let sheet = self
            .sheet(&defined.sheet)
            .ok_or_else(|| missing_sheet(&defined.sheet))?;
        Ok(sheet.read_area(defined.area))
    }

    fn read_table(&self, name: &str) -> Result<TableSnapshot> {
        let location = self.table_location(name)?;
        let sheet = self
            .sheet(&location.sheet)
            .ok_or_else(|| missing_sheet(&location.sheet))?;
        let body = location.area;
        let header = (body.col..=body.last_col())
            .map(|col| sheet.value(body.row - 1, col).display())
            .collect();

        Ok(TableSnapshot {
            name: name.to_string(),
            sheet: location.sheet.clone(),
            header,
            body,
            rows: sheet.read_area(body),
        })
    }

    fn last_used_row(&self, sheet: &str) -> Result<Option<u32>> {
        self.sheet(sheet)
            .map(Sheet::last_used_row)
            .ok_or_else(|| missing_sheet(sheet))
    }

    fn sync(&mut self, batch: Batch) -> Result<()> {
        debug!(requests = batch.len(), "applying batch");
        for request in batch.into_requests() {
            self.apply(request)?;
        }
        Ok(())
    }
}

/// Grows the `grown` entry by one row and moves entries that start at or
/// below `insert_at` in the columns of `location` down by one row.
fn shift_names_below(
    names: &mut BTreeMap<String, DefinedName>,
    grown: Option<&str>,
    location: &DefinedName,
    insert_at: u32,
) {
    for (name, defined) in names.iter_mut() {
        if defined.sheet != location.sheet {
            continue;
        }
        if grown == Some(name.as_str()) {
            defined.area.height += 1;
        } else if defined.area.row >= insert_at && defined.area.overlaps_columns(&location.area) {
            debug!(%name, "shifting name below inserted table row");
            defined.area.row += 1;
        }
    }
}

fn column_of(snapshot: &TableSnapshot, column: &str) -> Result<usize> {
    snapshot.column_index(column).ok_or_else(|| {
        ToolError::InvalidWorkbook(format!(
            "table '{}' has no column '{column}'",
            snapshot.name
        ))
    })
}

fn missing_sheet(name: &str) -> ToolError {
    ToolError::InvalidWorkbook(format!("missing sheet '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_workbook() -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Workflow Log");
        sheet.set_value(0, 0, "Date");
        sheet.set_value(0, 1, "Recitals");
        sheet.set_value(1, 0, "2019-10-01");
        sheet.set_value(1, 1, "10/6");
        sheet.set_value(5, 0, "notes");
        workbook.define_name("WorkflowLog", "Workflow Log", Area::new(1, 0, 1, 2));
        workbook.define_name("Notes", "Workflow Log", Area::cell(5, 0));
        workbook
    }

    #[test]
    fn inserting_a_table_row_shifts_the_body_down() {
        let mut workbook = log_workbook();
        let mut batch = Batch::new();
        batch.insert_table_row("WorkflowLog", 0, vec!["2019-11-01".into(), "11/4".into()]);
        workbook.sync(batch).expect("batch applied");

        let table = workbook.read_table("WorkflowLog").expect("log table");
        assert_eq!(table.body, Area::new(1, 0, 2, 2));
        assert_eq!(table.rows[0], vec![CellValue::from("2019-11-01"), "11/4".into()]);
        assert_eq!(table.rows[1], vec![CellValue::from("2019-10-01"), "10/6".into()]);

        let notes = workbook.read_named_range("Notes").expect("notes range");
        assert_eq!(notes, vec![vec![CellValue::from("notes")]]);
    }

    #[test]
    fn tables_require_a_header_row() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("Data");
        workbook.define_name("Body", "Data", Area::new(0, 0, 2, 2));
        assert!(workbook.read_table("Body").is_err());
    }

    #[test]
    fn last_used_row_ignores_blank_unstyled_cells() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("History");
        assert_eq!(sheet.last_used_row(), None);
        sheet.set_value(2, 0, "x");
        sheet.set_value(9, 0, CellValue::Empty);
        assert_eq!(sheet.last_used_row(), Some(2));
        sheet.apply_style(Area::cell(7, 3), &CellStyle::new().bold());
        assert_eq!(sheet.last_used_row(), Some(7));
    }

    #[test]
    fn overlapping_merges_are_rejected() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("History");
        let mut batch = Batch::new();
        batch.merge("History", Area::new(0, 0, 1, 6));
        batch.merge("History", Area::new(0, 3, 1, 2));
        assert!(workbook.sync(batch).is_err());
    }

    #[test]
    fn filters_hide_non_matching_rows() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Repertoire");
        sheet.set_value(0, 0, "ID");
        sheet.set_value(0, 1, "O1");
        for (offset, flag) in [1.0, 0.0, 1.0].into_iter().enumerate() {
            sheet.set_value(1 + offset as u32, 0, offset as f64);
            sheet.set_value(1 + offset as u32, 1, flag);
        }
        workbook.define_name("RepertoireList", "Repertoire", Area::new(1, 0, 3, 2));

        let mut batch = Batch::new();
        batch.apply_filter("RepertoireList", "O1", vec!["1".to_string()]);
        workbook.sync(batch).expect("batch applied");
        assert_eq!(
            workbook.visible_table_rows("RepertoireList").expect("visible rows"),
            vec![0, 2]
        );

        let mut batch = Batch::new();
        batch.clear_filter("RepertoireList", "O1");
        workbook.sync(batch).expect("batch applied");
        assert_eq!(
            workbook.visible_table_rows("RepertoireList").expect("visible rows"),
            vec![0, 1, 2]
        );
        assert!(workbook.table_filters("RepertoireList").is_none());
    }

    #[test]
    fn unknown_filter_columns_fail() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Repertoire");
        sheet.set_value(0, 0, "ID");
        workbook.define_name("RepertoireList", "Repertoire", Area::new(1, 0, 1, 1));
        let mut batch = Batch::new();
        batch.clear_filter("RepertoireList", "O9");
        assert!(workbook.sync(batch).is_err());
    }

    #[test]
    fn excel_tables_take_precedence_and_grow() {
        let mut workbook = log_workbook();
        workbook.define_table("WorkflowLog", "Workflow Log", Area::new(1, 0, 1, 2));
        workbook.define_name("WorkflowLog", "Workflow Log", Area::new(1, 0, 1, 1));

        let mut batch = Batch::new();
        batch.insert_table_row("WorkflowLog", 0, vec!["2019-11-01".into(), "11/4".into()]);
        workbook.sync(batch).expect("batch applied");

        let table = workbook.read_table("WorkflowLog").expect("log table");
        assert_eq!(table.body, Area::new(1, 0, 2, 2));
        assert_eq!(table.header, vec!["Date".to_string(), "Recitals".to_string()]);
        assert!(workbook.is_excel_table("WorkflowLog"));
        assert_eq!(
            workbook.read_named_range("Notes").expect("notes range"),
            vec![vec![CellValue::from("notes")]]
        );
    }

    #[test]
    fn inserting_a_row_moves_tables_below() {
        let mut workbook = log_workbook();
        let sheet = workbook.add_sheet("Workflow Log");
        sheet.set_value(7, 0, "Archive");
        sheet.set_value(8, 0, "2018-12-01");
        workbook.define_table("Archive", "Workflow Log", Area::new(8, 0, 1, 1));

        let mut batch = Batch::new();
        batch.insert_table_row("WorkflowLog", 1, vec!["2019-09-01".into()]);
        workbook.sync(batch).expect("batch applied");

        let archive = workbook.read_table("Archive").expect("archive table");
        assert_eq!(archive.body, Area::new(9, 0, 1, 1));
        assert_eq!(archive.header, vec!["Archive".to_string()]);
        assert_eq!(archive.rows[0][0], CellValue::from("2018-12-01"));
    }
}
