//! Recital and composition records.
//!
//! Both records are immutable after construction and serialize with the
//! field names used by the workflow audit log.

pub mod date;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::error::{Result, ToolError};
use crate::workbook::{CellValue, serialize_number};

/// Sub-letter that opens a lettered group of compositions.
pub const FIRST_LETTER: &str = "a.";

/// Venue placeholder meaning "no recital in this slot".
pub const NO_VENUE: &str = "None";

/// One entry of a recital program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub number: String,
    pub letter: String,
    pub id: i64,
    pub title: String,
    pub composer: String,
    /// Minutes; `None` for an empty cell.
    #[serde(serialize_with = "serialize_length")]
    pub length: Option<f64>,
    pub tab: CellValue,
    pub cc: CellValue,
}

impl Composition {
    /// Builds a composition from a repertoire block row laid out as
    /// `number, letter, id, title, composer, length, tab, cc`.
    ///
    /// Rows with an empty title are not compositions and yield `None`.
    pub fn from_row(row: &[CellValue], location: &str) -> Result<Option<Self>> {
        let cell = |index: usize| row.get(index).cloned().unwrap_or_default();

        let title = cell(3).display();
        if title.is_empty() {
            return Ok(None);
        }

        let id = parse_id(&cell(2)).ok_or_else(|| ToolError::InvalidCell {
            location: location.to_string(),
            reason: format!("composition id '{}' is not an integer", cell(2).display()),
        })?;

        let length = match cell(5) {
            value if value.is_empty() => None,
            value => Some(value.as_f64().ok_or_else(|| ToolError::InvalidCell {
                location: location.to_string(),
                reason: format!("length '{}' is not a number", value.display()),
            })?),
        };

        Ok(Some(Self {
            number: cell(0).display(),
            letter: cell(1).display(),
            id,
            title,
            composer: cell(4).display(),
            length,
            tab: cell(6),
            cc: cell(7),
        }))
    }
}

fn serialize_length<S: Serializer>(
    length: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match length {
        Some(minutes) => serialize_number(minutes, serializer),
        None => serializer.serialize_str(""),
    }
}

fn parse_id(value: &CellValue) -> Option<i64> {
    let number = value.as_f64()?;
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Some(number as i64)
    } else {
        None
    }
}

/// A scheduled recital with its program.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recital {
    #[serde(serialize_with = "serialize_number")]
    pub date_stamp: f64,
    /// UTC timestamp of the date stamp, time of day included.
    #[serde(serialize_with = "date::serialize_timestamp")]
    pub date: NaiveDateTime,
    pub date_string: String,
    pub performer: String,
    pub venue12: String,
    pub venue2: String,
    pub repertoire: Vec<Composition>,
    pub program: String,
}

impl Recital {
    pub fn new(
        date_stamp: f64,
        performer: impl Into<String>,
        venue12: impl Into<String>,
        venue2: impl Into<String>,
        mut repertoire: Vec<Composition>,
    ) -> Result<Self> {
        let date = date::stamp_to_datetime(date_stamp)?;
        normalize_letters(&mut repertoire);

        let mut recital = Self {
            date_stamp,
            date,
            date_string: date::iso_date(date.date()),
            performer: performer.into(),
            venue12: venue12.into(),
            venue2: venue2.into(),
            repertoire,
            program: String::new(),
        };
        recital.program = recital.program_to_string();
        Ok(recital)
    }

    /// Renders the printed program:
    ///
    /// ```text
    /// Brian Mathias
    /// Monday, November 4, 2019
    /// 12:00 - Tabernacle
    /// 2:00 - Conference Center
    ///
    /// 1. Venite! - John Leavitt
    /// 2. a. Flute Solo - Thomas Arne
    ///    b. My Shepherd Will Supply My Need - Dale Wood
    /// ```
    pub fn program_to_string(&self) -> String {
        let mut program = String::new();
        program.push_str(&self.performer);
        program.push('\n');
        program.push_str(&date::long_date(self.date.date()));
        program.push('\n');

        for (time, venue) in [("12:00", &self.venue12), ("2:00", &self.venue2)] {
            if has_venue(venue) {
                program.push_str(&format!("{time} - {venue}\n"));
            }
        }
        program.push('\n');

        for composition in &self.repertoire {
            if composition.number.is_empty() {
                program.push_str("   ");
            } else {
                program.push_str(&composition.number);
                program.push(' ');
            }
            if !composition.letter.is_empty() {
                program.push_str(&composition.letter);
                program.push(' ');
            }
            program.push_str(&format!("{} - {}\n", composition.title, composition.composer));
        }

        program
    }

    /// Sum of all composition lengths, in minutes. Empty lengths count as 0.
    pub fn total_length(&self) -> f64 {
        self.repertoire
            .iter()
            .filter_map(|composition| composition.length)
            .sum()
    }
}

/// Returns `false` for empty venues and the `None` placeholder.
pub fn has_venue(venue: &str) -> bool {
    !venue.is_empty() && venue != NO_VENUE
}

/// Clears an `a.` that does not start a real group: the last entry, or an
/// entry followed by another `a.`.
fn normalize_letters(repertoire: &mut [Composition]) {
    let original: Vec<bool> = repertoire
        .iter()
        .map(|composition| composition.letter == FIRST_LETTER)
        .collect();

    for (index, composition) in repertoire.iter_mut().enumerate() {
        if !original[index] {
            continue;
        }
        let next_starts_group = original.get(index + 1).copied();
        if next_starts_group.unwrap_or(true) {
            composition.letter.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composition(
        number: &str,
        letter: &str,
        id: i64,
        title: &str,
        composer: &str,
    ) -> Composition {
        Composition {
            number: number.to_string(),
            letter: letter.to_string(),
            id,
            title: title.to_string(),
            composer: composer.to_string(),
            length: Some(5.0),
            tab: CellValue::Empty,
            cc: CellValue::Empty,
        }
    }

    fn letters(recital: &Recital) -> Vec<&str> {
        recital
            .repertoire
            .iter()
            .map(|composition| composition.letter.as_str())
            .collect()
    }

    #[test]
    fn parses_a_block_row() {
        let row: Vec<CellValue> = vec![
            "1.".into(),
            "".into(),
            CellValue::Number(87.0),
            "Carillon de Westminster".into(),
            "Louis Vierne".into(),
            CellValue::Number(7.0),
            "25".into(),
            "23A".into(),
        ];
        let composition = Composition::from_row(&row, "Recital1 row 1")
            .expect("row parsed")
            .expect("row is a composition");
        assert_eq!(composition.id, 87);
        assert_eq!(composition.number, "1.");
        assert_eq!(composition.length, Some(7.0));
        assert_eq!(composition.cc, CellValue::from("23A"));
    }

    #[test]
    fn rows_without_title_are_skipped() {
        let row: Vec<CellValue> = vec!["2.".into(), "".into(), CellValue::Number(12.0)];
        let parsed = Composition::from_row(&row, "Recital1 row 2").expect("row parsed");
        assert_eq!(parsed, None);
    }

    #[test]
    fn titled_rows_need_an_integer_id() {
        let row: Vec<CellValue> = vec!["1.".into(), "".into(), "abc".into(), "Toccata".into()];
        let error = Composition::from_row(&row, "Recital1 row 3").expect_err("id rejected");
        assert!(error.to_string().contains("Recital1 row 3"));
    }

    #[test]
    fn trailing_single_letter_is_cleared() {
        let recital = Recital::new(
            43773.0,
            "Brian Mathias",
            "",
            "",
            vec![
                composition("1.", "", 1, "Venite!", "John Leavitt"),
                composition("2.", "a.", 2, "Flute Solo", "Thomas Arne"),
            ],
        )
        .expect("recital built");
        assert_eq!(letters(&recital), vec!["", ""]);
    }

    #[test]
    fn lone_letter_before_new_group_is_cleared() {
        let recital = Recital::new(
            43773.0,
            "Brian Mathias",
            "",
            "",
            vec![
                composition("1.", "a.", 1, "Prelude", "Bach"),
                composition("2.", "a.", 2, "Flute Solo", "Thomas Arne"),
                composition("", "b.", 3, "My Shepherd", "Dale Wood"),
            ],
        )
        .expect("recital built");
        assert_eq!(letters(&recital), vec!["", "a.", "b."]);
    }

    #[test]
    fn consecutive_lone_letters_are_all_cleared() {
        let recital = Recital::new(
            43773.0,
            "Brian Mathias",
            "",
            "",
            vec![
                composition("1.", "a.", 1, "Prelude", "Bach"),
                composition("2.", "a.", 2, "Fugue", "Bach"),
            ],
        )
        .expect("recital built");
        assert_eq!(letters(&recital), vec!["", ""]);
    }

    #[test]
    fn renders_the_program() {
        let recital = Recital::new(
            43773.0,
            "Brian Mathias",
            "Tabernacle",
            "Conference Center",
            vec![
                composition("1.", "", 1, "Venite!", "John Leavitt"),
                composition("2.", "a.", 2, "Flute Solo", "Thomas Arne"),
                composition("", "b.", 3, "My Shepherd Will Supply My Need", "Dale Wood"),
                composition("3.", "", 4, "Carillon de Westminster", "Louis Vierne"),
            ],
        )
        .expect("recital built");

        let expected = "Brian Mathias\n\
                        Monday, November 4, 2019\n\
                        12:00 - Tabernacle\n\
                        2:00 - Conference Center\n\
                        \n\
                        1. Venite! - John Leavitt\n\
                        2. a. Flute Solo - Thomas Arne\n   \
                        b. My Shepherd Will Supply My Need - Dale Wood\n\
                        3. Carillon de Westminster - Louis Vierne\n";
        assert_eq!(recital.program, expected);
        assert_eq!(recital.program_to_string(), expected);
    }

    #[test]
    fn missing_venues_are_omitted() {
        let recital =
            Recital::new(43773.0, "Brian Mathias", "None", "", Vec::new()).expect("recital built");
        assert_eq!(recital.program, "Brian Mathias\nMonday, November 4, 2019\n\n");

        let lowercase =
            Recital::new(43773.0, "Brian Mathias", "none", "", Vec::new()).expect("recital built");
        assert!(lowercase.program.contains("12:00 - none\n"));
    }

    #[test]
    fn serializes_with_audit_field_names() {
        let recital = Recital::new(
            43773.0,
            "Brian Mathias",
            "Tabernacle",
            "None",
            vec![composition("1.", "", 87, "Carillon", "Louis Vierne")],
        )
        .expect("recital built");
        let json = serde_json::to_value(&recital).expect("recital serialized");

        assert_eq!(json["dateStamp"], serde_json::json!(43773));
        assert_eq!(json["date"], "2019-11-04T00:00:00.000Z");
        assert_eq!(json["dateString"], "2019-11-04");
        assert_eq!(json["venue12"], "Tabernacle");
        assert_eq!(json["repertoire"][0]["id"], 87);
        assert_eq!(json["repertoire"][0]["length"], serde_json::json!(5));
        assert_eq!(json["repertoire"][0]["tab"], "");

        let text = serde_json::to_string(&recital).expect("recital serialized");
        let order: Vec<usize> = [
            "\"dateStamp\"",
            "\"date\"",
            "\"dateString\"",
            "\"performer\"",
            "\"venue12\"",
            "\"venue2\"",
            "\"repertoire\"",
            "\"program\"",
        ]
        .iter()
        .map(|key| text.find(key).expect("key present"))
        .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn empty_lengths_serialize_as_empty_text() {
        let row: Vec<CellValue> = vec![
            "1.".into(),
            "".into(),
            CellValue::Number(40.0),
            "Improvisation".into(),
            "Brian Mathias".into(),
            CellValue::Empty,
        ];
        let composition = Composition::from_row(&row, "Recital1 row 4")
            .expect("row parsed")
            .expect("row is a composition");
        assert_eq!(composition.length, None);

        let json = serde_json::to_value(&composition).expect("composition serialized");
        assert_eq!(json["length"], "");
        assert_eq!(json["tab"], "");
    }

    #[test]
    fn total_length_skips_empty_lengths() {
        let mut open_length = composition("2.", "", 2, "Improvisation", "Brian Mathias");
        open_length.length = None;
        let recital = Recital::new(
            43773.0,
            "Brian Mathias",
            "",
            "",
            vec![composition("1.", "", 1, "Venite!", "John Leavitt"), open_length],
        )
        .expect("recital built");
        assert_eq!(recital.total_length(), 5.0);
    }

    #[test]
    fn fractional_stamps_keep_their_time_in_json() {
        let recital = Recital::new(43773.75, "Brian Mathias", "", "", Vec::new())
            .expect("recital built");
        let json = serde_json::to_value(&recital).expect("recital serialized");
        assert_eq!(json["dateStamp"], 43773.75);
        assert_eq!(json["date"], "2019-11-04T18:00:00.000Z");
        assert_eq!(json["dateString"], "2019-11-04");
    }
}
