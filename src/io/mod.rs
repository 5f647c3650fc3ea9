//! Loading and saving `.xlsx` workbooks.

pub mod excel_read;
pub mod excel_write;
