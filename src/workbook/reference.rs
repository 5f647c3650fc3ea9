use crate::error::{Result, ToolError};
use crate::workbook::Area;

/// Parses a sheet-qualified A1 reference such as `'Recital Planning'!$A$5:$H$12`
/// into its sheet name and zero-based area.
pub fn parse_reference(reference: &str) -> Result<(String, Area)> {
    let trimmed = reference.trim().trim_start_matches('=');
    let (sheet, cells) = trimmed
        .rsplit_once('!')
        .ok_or_else(|| invalid(reference, "missing sheet name"))?;

    let sheet = unquote_sheet(sheet);
    if sheet.is_empty() {
        return Err(invalid(reference, "empty sheet name"));
    }

    let (first, last) = match cells.split_once(':') {
        Some((first, last)) => (first, last),
        None => (cells, cells),
    };
    let (first_row, first_col) =
        parse_cell(first).ok_or_else(|| invalid(reference, "malformed cell reference"))?;
    let (last_row, last_col) =
        parse_cell(last).ok_or_else(|| invalid(reference, "malformed cell reference"))?;

    let row = first_row.min(last_row);
    let col = first_col.min(last_col);
    let area = Area::new(
        row,
        col,
        first_row.max(last_row) - row + 1,
        first_col.max(last_col) - col + 1,
    );
    Ok((sheet, area))
}

/// Formats an absolute, sheet-qualified reference for `area`.
pub fn format_reference(sheet: &str, area: Area) -> String {
    let first = absolute_cell(area.row, area.col);
    let sheet = quote_sheet(sheet);
    if area.height == 1 && area.width == 1 {
        format!("{sheet}!{first}")
    } else {
        let last = absolute_cell(area.last_row(), area.last_col());
        format!("{sheet}!{first}:{last}")
    }
}

/// Relative A1 name of a single zero-based cell, e.g. `F12`.
pub fn cell_name(row: u32, col: u16) -> String {
    format!("{}{}", column_name(col), row + 1)
}

/// Spreadsheet column letters for a zero-based column index.
pub fn column_name(col: u16) -> String {
    let mut index = u32::from(col) + 1;
    let mut letters = Vec::new();
    while index > 0 {
        let remainder = ((index - 1) % 26) as u8;
        letters.push(char::from(b'A' + remainder));
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn parse_cell(cell: &str) -> Option<(u32, u16)> {
    let cell = cell.replace('$', "");
    let split = cell.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: u32 = 0;
    for ch in letters.chars() {
        col = col * 26 + u32::from(ch.to_ascii_uppercase() as u8 - b'A' + 1);
        if col > u32::from(u16::MAX) {
            return None;
        }
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, (col - 1) as u16))
}

fn absolute_cell(row: u32, col: u16) -> String {
    format!("${}${}", column_name(col), row + 1)
}

fn unquote_sheet(sheet: &str) -> String {
    let sheet = sheet.trim();
    match sheet
        .strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => sheet.to_string(),
    }
}

fn quote_sheet(sheet: &str) -> String {
    if sheet
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

fn invalid(reference: &str, reason: &str) -> ToolError {
    ToolError::InvalidWorkbook(format!("cannot parse reference '{reference}': {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_sheet_ranges() {
        let (sheet, area) =
            parse_reference("'Recital Planning'!$A$5:$H$12").expect("range reference");
        assert_eq!(sheet, "Recital Planning");
        assert_eq!(area, Area::new(4, 0, 8, 8));
    }

    #[test]
    fn parses_single_cells_with_formula_prefix() {
        let (sheet, area) = parse_reference("=Options!$B$2").expect("cell reference");
        assert_eq!(sheet, "Options");
        assert_eq!(area, Area::cell(1, 1));
    }

    #[test]
    fn rejects_references_without_sheet() {
        assert!(parse_reference("A1:B2").is_err());
        assert!(parse_reference("Sheet1!#REF!").is_err());
    }

    #[test]
    fn formats_references_back() {
        assert_eq!(
            format_reference("Recital History", Area::new(4, 0, 2, 6)),
            "'Recital History'!$A$5:$F$6"
        );
        assert_eq!(format_reference("Options", Area::cell(1, 1)), "Options!$B$2");
    }

    #[test]
    fn column_names_roll_over() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(cell_name(11, 5), "F12");
    }
}
