//! Tabular host abstraction used by the recital workflow.
//!
//! The workflow never talks to a concrete spreadsheet. It reads named ranges
//! and tables through [`WorkbookHost`] and queues every mutation in a
//! [`Batch`] that the host applies at an explicit [`WorkbookHost::sync`]
//! point. [`Workbook`] is the in-memory host backing the command-line tool
//! and the tests.

pub mod memory;
pub mod reference;

use serde::{Serialize, Serializer};

use crate::error::Result;

pub use memory::{Cell, DefinedName, Sheet, Workbook};

/// Value stored in a single cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Formula text including the leading `=`.
    Formula(String),
}

impl CellValue {
    /// Returns `true` for empty cells and empty strings.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.is_empty(),
            _ => false,
        }
    }

    /// Text shown for the cell, with integral numbers rendered without a
    /// fractional part.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(value) | CellValue::Formula(value) => value.clone(),
            CellValue::Number(value) => value.to_string(),
            CellValue::Bool(value) => value.to_string().to_uppercase(),
        }
    }

    /// Numeric view of the cell. Text is parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            CellValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Text(value) | CellValue::Formula(value) => serializer.serialize_str(value),
            CellValue::Number(value) => serialize_number(value, serializer),
            CellValue::Bool(value) => serializer.serialize_bool(*value),
        }
    }
}

/// Serializes integral floats as JSON integers so `7.0` is written as `7`.
pub(crate) fn serialize_number<S: Serializer>(
    value: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Rectangular, zero-based block of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub row: u32,
    pub col: u16,
    pub height: u32,
    pub width: u16,
}

impl Area {
    pub fn new(row: u32, col: u16, height: u32, width: u16) -> Self {
        Self {
            row,
            col,
            height,
            width,
        }
    }

    pub fn cell(row: u32, col: u16) -> Self {
        Self::new(row, col, 1, 1)
    }

    pub fn last_row(&self) -> u32 {
        self.row + self.height.saturating_sub(1)
    }

    pub fn last_col(&self) -> u16 {
        self.col + self.width.saturating_sub(1)
    }

    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.row && row <= self.last_row() && col >= self.col && col <= self.last_col()
    }

    pub fn overlaps_columns(&self, other: &Area) -> bool {
        self.col <= other.last_col() && other.col <= self.last_col()
    }

    /// `true` when the two areas share at least one cell.
    pub fn intersects(&self, other: &Area) -> bool {
        self.overlaps_columns(other)
            && self.row <= other.last_row()
            && other.row <= self.last_row()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Center,
    Right,
}

/// Cell edges that can carry a thin border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl Edges {
    pub const ALL: Edges = Edges {
        top: true,
        bottom: true,
        left: true,
        right: true,
    };

    pub const BOTTOM: Edges = Edges {
        top: false,
        bottom: true,
        left: false,
        right: false,
    };

    fn union(self, other: Edges) -> Edges {
        Edges {
            top: self.top || other.top,
            bottom: self.bottom || other.bottom,
            left: self.left || other.left,
            right: self.right || other.right,
        }
    }
}

/// Presentation attributes of a cell. Unset fields leave the existing
/// attribute untouched when a style is applied on top of another.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    pub bold: Option<bool>,
    pub font_size: Option<f64>,
    pub font_color: Option<u32>,
    pub fill: Option<u32>,
    pub align: Option<Align>,
    pub borders: Edges,
    pub num_format: Option<String>,
}

impl CellStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(mut self) -> Self {
        self.bold = Some(true);
        self
    }

    pub fn font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn font_color(mut self, color: u32) -> Self {
        self.font_color = Some(color);
        self
    }

    pub fn fill(mut self, color: u32) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn borders(mut self, edges: Edges) -> Self {
        self.borders = self.borders.union(edges);
        self
    }

    pub fn num_format(mut self, format: impl Into<String>) -> Self {
        self.num_format = Some(format.into());
        self
    }

    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }

    /// Overlays `other` on top of `self`.
    pub fn merge(&mut self, other: &CellStyle) {
        if other.bold.is_some() {
            self.bold = other.bold;
        }
        if other.font_size.is_some() {
            self.font_size = other.font_size;
        }
        if other.font_color.is_some() {
            self.font_color = other.font_color;
        }
        if other.fill.is_some() {
            self.fill = other.fill;
        }
        if other.align.is_some() {
            self.align = other.align;
        }
        if other.num_format.is_some() {
            self.num_format = other.num_format.clone();
        }
        self.borders = self.borders.union(other.borders);
    }
}

/// One queued mutation of the host.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Values {
        sheet: String,
        row: u32,
        col: u16,
        values: Vec<Vec<CellValue>>,
    },
    Style {
        sheet: String,
        area: Area,
        style: CellStyle,
    },
    Merge {
        sheet: String,
        area: Area,
    },
    /// Inserts a row into a table body at a zero-based position.
    InsertTableRow {
        table: String,
        position: u32,
        values: Vec<CellValue>,
    },
    ClearFilter {
        table: String,
        column: String,
    },
    /// Shows only rows whose `column` displays one of `values`.
    ApplyFilter {
        table: String,
        column: String,
        values: Vec<String>,
    },
}

/// Ordered set of write requests applied together by [`WorkbookHost::sync`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    requests: Vec<WriteRequest>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: WriteRequest) {
        self.requests.push(request);
    }

    pub fn write_values(&mut self, sheet: &str, row: u32, col: u16, values: Vec<Vec<CellValue>>) {
        self.push(WriteRequest::Values {
            sheet: sheet.to_string(),
            row,
            col,
            values,
        });
    }

    pub fn style(&mut self, sheet: &str, area: Area, style: CellStyle) {
        self.push(WriteRequest::Style {
            sheet: sheet.to_string(),
            area,
            style,
        });
    }

    pub fn merge(&mut self, sheet: &str, area: Area) {
        self.push(WriteRequest::Merge {
            sheet: sheet.to_string(),
            area,
        });
    }

    pub fn insert_table_row(&mut self, table: &str, position: u32, values: Vec<CellValue>) {
        self.push(WriteRequest::InsertTableRow {
            table: table.to_string(),
            position,
            values,
        });
    }

    pub fn clear_filter(&mut self, table: &str, column: &str) {
        self.push(WriteRequest::ClearFilter {
            table: table.to_string(),
            column: column.to_string(),
        });
    }

    pub fn apply_filter(&mut self, table: &str, column: &str, values: Vec<String>) {
        self.push(WriteRequest::ApplyFilter {
            table: table.to_string(),
            column: column.to_string(),
            values,
        });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[WriteRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<WriteRequest> {
        self.requests
    }
}

/// Point-in-time copy of a table body together with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub name: String,
    pub sheet: String,
    /// Header labels, read from the row directly above the body.
    pub header: Vec<String>,
    pub body: Area,
    pub rows: Vec<Vec<CellValue>>,
}

impl TableSnapshot {
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.header.iter().position(|label| label == header)
    }

    /// Sheet row index of a zero-based body row.
    pub fn sheet_row(&self, index: usize) -> u32 {
        self.body.row + index as u32
    }

    /// Sheet column index of a zero-based table column.
    pub fn sheet_col(&self, offset: usize) -> u16 {
        self.body.col + offset as u16
    }
}

/// Capability surface of the spreadsheet the workflow runs against.
pub trait WorkbookHost {
    /// Values of a named range, row-major.
    fn read_named_range(&self, name: &str) -> Result<Vec<Vec<CellValue>>>;

    fn read_table(&self, name: &str) -> Result<TableSnapshot>;

    /// Zero-based index of the last row holding a value or a style, or
    /// `None` when the sheet is blank.
    fn last_used_row(&self, sheet: &str) -> Result<Option<u32>>;

    /// Applies every request of `batch` in order.
    fn sync(&mut self, batch: Batch) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_drops_integral_fraction() {
        assert_eq!(CellValue::Number(7.0).display(), "7");
        assert_eq!(CellValue::Number(7.25).display(), "7.25");
        assert_eq!(CellValue::Empty.display(), "");
    }

    #[test]
    fn serializes_cells_like_spreadsheet_values() {
        let cells = vec![
            CellValue::Empty,
            CellValue::from("23A"),
            CellValue::Number(25.0),
            CellValue::Number(4.5),
            CellValue::Bool(true),
        ];
        let json = serde_json::to_string(&cells).expect("cells serialized");
        assert_eq!(json, r#"["","23A",25,4.5,true]"#);
    }

    #[test]
    fn style_merge_overlays_set_fields() {
        let mut base = CellStyle::new().fill(0xDADADA).borders(Edges::BOTTOM);
        base.merge(&CellStyle::new().bold().borders(Edges {
            top: true,
            ..Edges::default()
        }));
        assert_eq!(base.bold, Some(true));
        assert_eq!(base.fill, Some(0xDADADA));
        assert!(base.borders.top && base.borders.bottom);
        assert!(!base.borders.left);
    }

    #[test]
    fn area_bounds() {
        let area = Area::new(4, 1, 3, 5);
        assert_eq!(area.last_row(), 6);
        assert_eq!(area.last_col(), 5);
        assert!(area.contains(6, 5));
        assert!(!area.contains(7, 5));
        assert!(area.overlaps_columns(&Area::cell(0, 5)));
        assert!(!area.overlaps_columns(&Area::cell(0, 6)));
        assert!(area.intersects(&Area::new(6, 0, 2, 2)));
        assert!(!area.intersects(&Area::cell(3, 1)));
    }
}
