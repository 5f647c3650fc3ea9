//! Core library for the recital-tools command line application.
//!
//! The library turns the recital planning data of an organ-recital workbook
//! into printed programs and report rows. The workbook is reached through the
//! [`workbook::WorkbookHost`] trait; [`workbook::Workbook`] is the in-memory
//! host loaded and saved by [`io`]. Recital records live in [`model`], the
//! planning reader in [`collection`], the report writers in [`report`], the
//! repertoire filter in [`filter`], and the run orchestration in
//! [`workflow`].

pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod model;
pub mod report;
pub mod workbook;
pub mod workflow;

pub use error::{Result, ToolError};
