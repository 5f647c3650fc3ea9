//! Workflow options and workbook layout.
//!
//! Options are read from named ranges on the options sheet and validated in
//! one step into an immutable [`WorkflowOptions`].

use tracing::debug;

use crate::error::{Result, ToolError};
use crate::workbook::{CellValue, WorkbookHost};

/// Placeholder substituted with the 1-based recital index in field templates.
pub const INDEX_PLACEHOLDER: &str = "{{index}}";

pub const PERFORMER: &str = "OpPerformer";
pub const UPDATE_DATES: &str = "OpUpdateDates";
pub const ADD_TO_HISTORY: &str = "OpAddToHistory";
pub const DATE_COLUMN: &str = "OpDateColumn";
pub const RECITAL_COUNT: &str = "OpRecitalCount";
pub const REPERTOIRE_FIELD: &str = "OpRepFieldName";
pub const DATE_FIELD: &str = "OpDateFieldName";
pub const VENUE12_FIELD: &str = "OpV12FieldName";
pub const VENUE2_FIELD: &str = "OpV2FieldName";

/// Where the workflow finds its tables and sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookLayout {
    /// Lookup table of the repertoire, keyed by composition id in its first
    /// column.
    pub repertoire_table: String,
    pub history_sheet: String,
    pub workflow_log_table: String,
}

impl Default for WorkbookLayout {
    fn default() -> Self {
        Self {
            repertoire_table: "RepertoireList".to_string(),
            history_sheet: "Recital History".to_string(),
            workflow_log_table: "WorkflowLog".to_string(),
        }
    }
}

/// Template for a per-recital range name, e.g. `Recital{{index}}D`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate(String);

impl NameTemplate {
    pub fn parse(option: &str, template: &str) -> Result<Self> {
        if !template.contains(INDEX_PLACEHOLDER) {
            return Err(ToolError::InvalidOption {
                name: option.to_string(),
                value: template.to_string(),
                reason: format!("template must contain {INDEX_PLACEHOLDER}"),
            });
        }
        Ok(Self(template.to_string()))
    }

    /// Replaces the first placeholder with `index`.
    pub fn expand(&self, index: u32) -> String {
        self.0.replacen(INDEX_PLACEHOLDER, &index.to_string(), 1)
    }
}

/// Range names holding one recital slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecitalFields {
    pub repertoire: String,
    pub date: String,
    pub venue12: String,
    pub venue2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTemplates {
    pub repertoire: NameTemplate,
    pub date: NameTemplate,
    pub venue12: NameTemplate,
    pub venue2: NameTemplate,
}

impl FieldTemplates {
    pub fn resolve(&self, index: u32) -> RecitalFields {
        RecitalFields {
            repertoire: self.repertoire.expand(index),
            date: self.date.expand(index),
            venue12: self.venue12.expand(index),
            venue2: self.venue2.expand(index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    pub performer: String,
    pub update_dates: bool,
    pub add_to_history: bool,
    /// Offset of the first performance-history column in the repertoire
    /// table.
    pub date_column: usize,
    pub recital_count: u32,
    pub templates: FieldTemplates,
}

impl WorkflowOptions {
    /// Reads and validates every option. Fails on the first missing or
    /// malformed value.
    pub fn load(host: &impl WorkbookHost) -> Result<Self> {
        let read = |name: &str| first_cell(host, name);

        let options = Self {
            performer: read(PERFORMER)?.display(),
            update_dates: parse_flag(UPDATE_DATES, &read(UPDATE_DATES)?)?,
            add_to_history: parse_flag(ADD_TO_HISTORY, &read(ADD_TO_HISTORY)?)?,
            date_column: parse_count(DATE_COLUMN, &read(DATE_COLUMN)?)? as usize,
            recital_count: parse_count(RECITAL_COUNT, &read(RECITAL_COUNT)?)?,
            templates: FieldTemplates {
                repertoire: NameTemplate::parse(
                    REPERTOIRE_FIELD,
                    &read(REPERTOIRE_FIELD)?.display(),
                )?,
                date: NameTemplate::parse(DATE_FIELD, &read(DATE_FIELD)?.display())?,
                venue12: NameTemplate::parse(VENUE12_FIELD, &read(VENUE12_FIELD)?.display())?,
                venue2: NameTemplate::parse(VENUE2_FIELD, &read(VENUE2_FIELD)?.display())?,
            },
        };
        debug!(?options, "workflow options loaded");
        Ok(options)
    }
}

/// First cell of a named range, or an empty value for an empty range.
pub fn first_cell(host: &impl WorkbookHost, name: &str) -> Result<CellValue> {
    let values = host.read_named_range(name)?;
    Ok(values
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .unwrap_or_default())
}

fn parse_flag(name: &str, value: &CellValue) -> Result<bool> {
    match value.display().trim().to_ascii_uppercase().as_str() {
        "Y" => Ok(true),
        "N" => Ok(false),
        _ => Err(invalid_option(name, value, "expected Y or N")),
    }
}

fn parse_count(name: &str, value: &CellValue) -> Result<u32> {
    match value.as_f64() {
        Some(number) if number >= 0.0 && number.fract() == 0.0 && number <= f64::from(u32::MAX) => {
            Ok(number as u32)
        }
        _ => Err(invalid_option(name, value, "expected a non-negative whole number")),
    }
}

fn invalid_option(name: &str, value: &CellValue, reason: &str) -> ToolError {
    ToolError::InvalidOption {
        name: name.to_string(),
        value: value.display(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{Area, Workbook};

    fn options_workbook(entries: &[(&str, CellValue)]) -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_sheet("Workflow Options");
        for (row, (_, value)) in entries.iter().enumerate() {
            sheet.set_value(row as u32, 1, value.clone());
        }
        for (row, (name, _)) in entries.iter().enumerate() {
            workbook.define_name(*name, "Workflow Options", Area::cell(row as u32, 1));
        }
        workbook
    }

    fn valid_entries() -> Vec<(&'static str, CellValue)> {
        vec![
            (PERFORMER, "Brian Mathias".into()),
            (UPDATE_DATES, "Y".into()),
            (ADD_TO_HISTORY, "n".into()),
            (DATE_COLUMN, CellValue::Number(8.0)),
            (RECITAL_COUNT, CellValue::Number(4.0)),
            (REPERTOIRE_FIELD, "Recital{{index}}".into()),
            (DATE_FIELD, "Recital{{index}}D".into()),
            (VENUE12_FIELD, "Recital{{index}}V12".into()),
            (VENUE2_FIELD, "Recital{{index}}V2".into()),
        ]
    }

    #[test]
    fn loads_all_options() {
        let workbook = options_workbook(&valid_entries());
        let options = WorkflowOptions::load(&workbook).expect("options loaded");
        assert_eq!(options.performer, "Brian Mathias");
        assert!(options.update_dates);
        assert!(!options.add_to_history);
        assert_eq!(options.date_column, 8);
        assert_eq!(options.recital_count, 4);

        let fields = options.templates.resolve(3);
        assert_eq!(fields.repertoire, "Recital3");
        assert_eq!(fields.date, "Recital3D");
        assert_eq!(fields.venue12, "Recital3V12");
        assert_eq!(fields.venue2, "Recital3V2");
    }

    #[test]
    fn missing_options_fail_fast() {
        let entries: Vec<_> = valid_entries()
            .into_iter()
            .filter(|(name, _)| *name != RECITAL_COUNT)
            .collect();
        let workbook = options_workbook(&entries);
        match WorkflowOptions::load(&workbook) {
            Err(ToolError::MissingName(name)) => assert_eq!(name, RECITAL_COUNT),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn malformed_flags_are_rejected() {
        let mut entries = valid_entries();
        entries[1].1 = "maybe".into();
        let workbook = options_workbook(&entries);
        assert!(matches!(
            WorkflowOptions::load(&workbook),
            Err(ToolError::InvalidOption { name, .. }) if name == UPDATE_DATES
        ));
    }

    #[test]
    fn counts_must_be_whole_numbers() {
        let mut entries = valid_entries();
        entries[4].1 = CellValue::Number(2.5);
        let workbook = options_workbook(&entries);
        assert!(WorkflowOptions::load(&workbook).is_err());
    }

    #[test]
    fn templates_need_a_placeholder() {
        assert!(NameTemplate::parse(DATE_FIELD, "RecitalD").is_err());
        let template =
            NameTemplate::parse(DATE_FIELD, "R{{index}}-{{index}}").expect("template parsed");
        assert_eq!(template.expand(2), "R2-{{index}}");
    }
}
