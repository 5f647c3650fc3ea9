use std::fmt;
use std::str::FromStr;

use tracing::{info, instrument};

use crate::error::{Result, ToolError};
use crate::workbook::{Batch, WorkbookHost};

/// Recital order columns of the repertoire table.
pub const ORDER_COLUMNS: [&str; 4] = ["O1", "O2", "O3", "O4"];

/// Value marking a composition as selected in an order column.
pub const SELECTED: &str = "1";

/// Which order column, if any, should filter the repertoire table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    /// 1-based order column.
    Order(u8),
    Clear,
}

impl FilterTarget {
    pub fn order(index: u8) -> Result<Self> {
        if (1..=ORDER_COLUMNS.len() as u8).contains(&index) {
            Ok(FilterTarget::Order(index))
        } else {
            Err(ToolError::InvalidOption {
                name: "filter".to_string(),
                value: index.to_string(),
                reason: format!("expected 1 to {} or clear", ORDER_COLUMNS.len()),
            })
        }
    }

    fn column(self) -> Option<&'static str> {
        match self {
            FilterTarget::Order(index) => usize::from(index)
                .checked_sub(1)
                .and_then(|offset| ORDER_COLUMNS.get(offset))
                .copied(),
            FilterTarget::Clear => None,
        }
    }
}

impl FromStr for FilterTarget {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("clear") {
            return Ok(FilterTarget::Clear);
        }
        match value.parse::<u8>() {
            Ok(index) => FilterTarget::order(index),
            Err(_) => Err(ToolError::InvalidOption {
                name: "filter".to_string(),
                value: value.to_string(),
                reason: format!("expected 1 to {} or clear", ORDER_COLUMNS.len()),
            }),
        }
    }
}

impl fmt::Display for FilterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterTarget::Order(index) => write!(f, "{index}"),
            FilterTarget::Clear => write!(f, "clear"),
        }
    }
}

/// Clears every order-column filter on `table`, then shows only the rows
/// selected in the target column.
#[instrument(level = "info", skip_all, fields(table = %table, %target))]
pub fn apply_order_filter(
    host: &mut impl WorkbookHost,
    table: &str,
    target: FilterTarget,
) -> Result<()> {
    let mut batch = Batch::new();
    for column in ORDER_COLUMNS {
        batch.clear_filter(table, column);
    }
    if let Some(column) = target.column() {
        batch.apply_filter(table, column, vec![SELECTED.to_string()]);
    }
    host.sync(batch)?;

    info!("repertoire filter set to {target}");
    Ok(())
}
