use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::model::Recital;
use crate::workbook::reference::cell_name;
use crate::workbook::{
    Align, Area, Batch, CellStyle, CellValue, Edges, Sheet, Workbook, WorkbookHost, WriteRequest,
};

pub const HISTORY_HEADER: [&str; 6] = ["ON", "OL", "ID", "Title", "Composer", "Length"];

const BLOCK_WIDTH: u16 = 6;
/// Rows from the last used row to the first row of the next block.
const BLOCK_OFFSET: u32 = 4;
/// Date and two venue rows precede the header.
const HEADER_OFFSET: u32 = 3;
/// Date, two venue rows and the header precede the body.
const BODY_OFFSET: u32 = 4;
const LENGTH_COL: u16 = 5;

const BLACK: u32 = 0x000000;
const WHITE: u32 = 0xFFFFFF;
const BAND: u32 = 0xDADADA;

/// Appends one formatted block per recital below the existing history.
/// Earlier blocks are never touched.
#[instrument(level = "info", skip_all, fields(sheet = %sheet))]
pub fn append_recital_history(
    host: &mut impl WorkbookHost,
    sheet: &str,
    recitals: &[Recital],
) -> Result<usize> {
    for recital in recitals {
        let start = host.last_used_row(sheet)?.unwrap_or(0) + BLOCK_OFFSET;
        debug!(
            start_row = start,
            date = %recital.date_string,
            minutes = recital.total_length(),
            "appending history block"
        );
        host.sync(history_block(sheet, start, recital))?;
    }

    info!(
        recitals = recitals.len(),
        "{} recitals added to recital history",
        recitals.len()
    );
    Ok(recitals.len())
}

/// Write requests for the history block of `recital` starting at sheet row
/// `start`.
pub fn history_block(sheet: &str, start: u32, recital: &Recital) -> Batch {
    let mut batch = Batch::new();
    batch.write_values(sheet, start, 0, block_values(start, recital));
    style_block(&mut batch, sheet, start, recital.repertoire.len() as u32);
    batch
}

/// Rows and size of a history block found on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub start: u32,
    pub compositions: u32,
}

/// Finds the blocks already on `sheet`: a header row matching
/// [`HISTORY_HEADER`], three rows below the block start, followed by
/// composition rows and a total row holding a formula in the length column.
pub fn find_history_blocks(sheet: &Sheet) -> Vec<BlockSpan> {
    let Some(last_row) = sheet.last_used_row() else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    let mut row = HEADER_OFFSET;
    while row <= last_row {
        if !is_header_row(sheet, row) {
            row += 1;
            continue;
        }
        match total_row_below(sheet, row, last_row) {
            Some(total_row) => {
                blocks.push(BlockSpan {
                    start: row - HEADER_OFFSET,
                    compositions: total_row - row - 1,
                });
                row = total_row + 1;
            }
            None => row += 1,
        }
    }
    blocks
}

/// Re-applies block styling and merges to the history blocks of a loaded
/// workbook. Formatting is not read from `.xlsx` files, so without this every
/// save would leave earlier blocks unformatted.
#[instrument(level = "info", skip_all, fields(sheet = %sheet))]
pub fn restore_history_formatting(workbook: &mut Workbook, sheet: &str) -> Result<usize> {
    let Some(history) = workbook.sheet(sheet) else {
        debug!("no history sheet, nothing to restore");
        return Ok(0);
    };

    let blocks = find_history_blocks(history);
    let mut styles = Batch::new();
    for block in &blocks {
        style_block(&mut styles, sheet, block.start, block.compositions);
    }

    let mut batch = Batch::new();
    for request in styles.into_requests() {
        if let WriteRequest::Merge { area, .. } = &request {
            if history.merges.iter().any(|merge| merge.intersects(area)) {
                continue;
            }
        }
        batch.push(request);
    }
    workbook.sync(batch)?;

    info!(blocks = blocks.len(), "history formatting restored");
    Ok(blocks.len())
}

fn block_values(start: u32, recital: &Recital) -> Vec<Vec<CellValue>> {
    let body_start = start + BODY_OFFSET;
    let body_len = recital.repertoire.len() as u32;

    let mut values = vec![
        pad_row(vec![CellValue::Number(recital.date_stamp)]),
        pad_row(vec!["12:00".into(), recital.venue12.clone().into()]),
        pad_row(vec!["2:00".into(), recital.venue2.clone().into()]),
        HISTORY_HEADER.iter().map(|label| CellValue::from(*label)).collect(),
    ];
    for composition in &recital.repertoire {
        values.push(vec![
            composition.number.clone().into(),
            composition.letter.clone().into(),
            CellValue::from(composition.id),
            composition.title.clone().into(),
            composition.composer.clone().into(),
            composition.length.map(CellValue::Number).unwrap_or_default(),
        ]);
    }
    let mut total = pad_row(Vec::new());
    total[usize::from(LENGTH_COL)] = CellValue::Formula(total_formula(body_start, body_len));
    values.push(total);
    values
}

fn style_block(batch: &mut Batch, sheet: &str, start: u32, body_len: u32) {
    let body_start = start + BODY_OFFSET;
    let total_row = body_start + body_len;

    let date_row = Area::new(start, 0, 1, BLOCK_WIDTH);
    batch.style(
        sheet,
        date_row,
        CellStyle::new()
            .num_format("m/d/yyyy")
            .bold()
            .font_size(14.0)
            .align(Align::Right)
            .borders(Edges::BOTTOM),
    );
    batch.merge(sheet, date_row);

    for venue_row in [start + 1, start + 2] {
        batch.style(
            sheet,
            Area::new(venue_row, 0, 1, 2),
            CellStyle::new().num_format("@"),
        );
        batch.style(sheet, Area::cell(venue_row, 0), CellStyle::new().bold());
        batch.merge(sheet, Area::new(venue_row, 1, 1, BLOCK_WIDTH - 1));
    }

    batch.style(
        sheet,
        Area::new(start + HEADER_OFFSET, 0, 1, BLOCK_WIDTH),
        CellStyle::new()
            .fill(BLACK)
            .font_color(WHITE)
            .bold()
            .align(Align::Center),
    );

    for row in body_start..total_row {
        let mut style = CellStyle::new().borders(Edges::ALL);
        if row % 2 == 0 {
            style = style.fill(BAND);
        }
        batch.style(sheet, Area::new(row, 0, 1, BLOCK_WIDTH), style);
        batch.style(sheet, Area::cell(row, 0), CellStyle::new().num_format("@"));
        batch.style(
            sheet,
            Area::cell(row, LENGTH_COL),
            CellStyle::new().num_format("0.00"),
        );
    }
    if body_len > 0 {
        batch.style(
            sheet,
            Area::new(body_start, 4, body_len, 2),
            CellStyle::new().align(Align::Right),
        );
    }

    batch.style(
        sheet,
        Area::cell(total_row, LENGTH_COL),
        CellStyle::new()
            .bold()
            .align(Align::Right)
            .num_format("0.00"),
    );
}

fn is_header_row(sheet: &Sheet, row: u32) -> bool {
    HISTORY_HEADER
        .iter()
        .enumerate()
        .all(|(col, label)| sheet.value(row, col as u16).display() == *label)
}

/// First row after `header_row` with a formula in the length column, unless a
/// blank row comes first.
fn total_row_below(sheet: &Sheet, header_row: u32, last_row: u32) -> Option<u32> {
    for row in header_row + 1..=last_row {
        if matches!(sheet.value(row, LENGTH_COL), CellValue::Formula(_)) {
            return Some(row);
        }
        if (0..BLOCK_WIDTH).all(|col| sheet.value(row, col).is_empty()) {
            return None;
        }
    }
    None
}

/// Sum over exactly the composition rows of a block.
fn total_formula(body_start: u32, body_len: u32) -> String {
    if body_len == 0 {
        return "=0".to_string();
    }
    format!(
        "=SUM({}:{})",
        cell_name(body_start, LENGTH_COL),
        cell_name(body_start + body_len - 1, LENGTH_COL)
    )
}

fn pad_row(mut cells: Vec<CellValue>) -> Vec<CellValue> {
    cells.resize(usize::from(BLOCK_WIDTH), CellValue::Empty);
    cells
}
