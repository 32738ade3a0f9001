//! crates/tsundoku_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::PortError;

/// Stable reader identifier handed to the core by the identity provider.
pub type ReaderId = Uuid;

/// How many books a reader intends to get through. Stored as its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingLevel {
    Light,
    #[default]
    Moderate,
    Heavy,
}

impl ReadingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingLevel::Light => "LIGHT",
            ReadingLevel::Moderate => "MODERATE",
            ReadingLevel::Heavy => "HEAVY",
        }
    }
}

impl fmt::Display for ReadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingLevel {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIGHT" => Ok(ReadingLevel::Light),
            "MODERATE" => Ok(ReadingLevel::Moderate),
            "HEAVY" => Ok(ReadingLevel::Heavy),
            other => Err(PortError::Validation(format!(
                "Invalid reading level '{}'",
                other
            ))),
        }
    }
}

/// Upper bound of a bubble count in every store (the width of a Postgres INTEGER).
pub const MAX_BUBBLE_COUNT: u32 = i32::MAX as u32;

/// The per-reader countdown. `last_decremented_on` is only written by the daily decay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BubbleState {
    pub active: bool,
    pub count: u32,
    pub last_decremented_on: Option<NaiveDate>,
}

/// Read-only projection of `BubbleState` returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleStatus {
    pub active: bool,
    pub count: u32,
}

impl From<&BubbleState> for BubbleStatus {
    fn from(state: &BubbleState) -> Self {
        Self {
            active: state.active,
            count: state.count,
        }
    }
}

/// Aggregate shelf counters kept on the reader row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShelfCounts {
    pub total_to_be_read: u32,
    pub total_completed: u32,
}

#[derive(Debug, Clone)]
pub struct Reader {
    pub id: ReaderId,
    pub reading_level: ReadingLevel,
    pub counts: ShelfCounts,
    pub bubble: BubbleState,
    pub created_at: DateTime<Utc>,
}

impl Reader {
    /// A freshly registered reader: empty shelves, bubble off.
    pub fn new(id: ReaderId, reading_level: ReadingLevel) -> Self {
        Self {
            id,
            reading_level,
            counts: ShelfCounts::default(),
            bubble: BubbleState::default(),
            created_at: Utc::now(),
        }
    }
}

/// Represents a book as stored in the book table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub cover: String,
    pub published_date: Option<NaiveDate>,
}

/// Book attributes as supplied by a caller, before validation.
#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub id: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub published_date: Option<String>,
}

impl NewBook {
    /// Checks the identifier and normalizes the published date.
    pub fn validate(self) -> Result<Book, PortError> {
        let id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PortError::Validation("Book identifier is required".to_string()))?;

        let published_date = match self.published_date.as_deref() {
            Some(raw) => normalize_published_date(raw)?,
            None => None,
        };

        Ok(Book {
            id,
            title: self.title.unwrap_or_default(),
            authors: self.authors,
            description: self.description.filter(|d| !d.is_empty()),
            cover: self.cover.unwrap_or_default(),
            published_date,
        })
    }
}

/// Pads `YYYY` and `YYYY-MM` to the first day of that period.
///
/// Blank input means "unknown" and yields `None`.
pub fn normalize_published_date(raw: &str) -> Result<Option<NaiveDate>, PortError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let padded = match raw.len() {
        4 => format!("{}-01-01", raw),
        7 => format!("{}-01", raw),
        _ => raw.to_string(),
    };

    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| PortError::Validation(format!("Invalid published date '{}'", raw)))
}

/// The link row between one reader and one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfMembership {
    pub reader_id: ReaderId,
    pub book_id: String,
    pub is_completed: bool,
    pub is_current_read: bool,
    pub added_at: DateTime<Utc>,
}

/// How a caller identifies the book to complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookRef {
    Id(String),
    Cover(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_year_is_padded_to_january_first() {
        let date = normalize_published_date("1999").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1999, 1, 1));
    }

    #[test]
    fn year_month_is_padded_to_first_day() {
        let date = normalize_published_date("2004-07").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2004, 7, 1));
    }

    #[test]
    fn full_date_is_kept_and_blank_is_unknown() {
        assert_eq!(
            normalize_published_date("2012-11-30").unwrap(),
            NaiveDate::from_ymd_opt(2012, 11, 30)
        );
        assert_eq!(normalize_published_date("  ").unwrap(), None);
    }

    #[test]
    fn garbage_date_is_a_validation_error() {
        let err = normalize_published_date("circa 1900").unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[test]
    fn book_without_identifier_is_rejected() {
        let book = NewBook {
            id: Some("   ".to_string()),
            title: Some("Dune".to_string()),
            ..Default::default()
        };
        assert!(matches!(book.validate(), Err(PortError::Validation(_))));
    }

    #[test]
    fn reading_level_parses_case_insensitively() {
        assert_eq!("heavy".parse::<ReadingLevel>().unwrap(), ReadingLevel::Heavy);
        assert_eq!(ReadingLevel::Light.to_string(), "LIGHT");
        assert!("EXTREME".parse::<ReadingLevel>().is_err());
    }
}
