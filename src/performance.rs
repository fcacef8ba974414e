use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::allocation::{Allocation, allocate, normalize_performers};
use crate::error::{LedgerError, Result};

/// Column layout of the performances worksheet. Columns A..H are the
/// historical layout; I carries the stable event id.
pub const PERFORMANCE_HEADER: &[&str] = &[
    "Date",
    "Venue",
    "Status",
    "TotalToken",
    "SharedPerPerson",
    "EquipmentShare",
    "Notes",
    "Performers",
    "Id",
];

const COL_DATE: usize = 0;
const COL_VENUE: usize = 1;
const COL_STATUS: usize = 2;
const COL_TOKEN: usize = 3;
const COL_SHARE: usize = 4;
const COL_EQUIPMENT: usize = 5;
const COL_NOTES: usize = 6;
const COL_PERFORMERS: usize = 7;
const COL_ID: usize = 8;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Upcoming,
    Done,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "Upcoming",
            EventStatus::Done => "Done",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "upcoming" => Ok(EventStatus::Upcoming),
            "done" => Ok(EventStatus::Done),
            other => Err(LedgerError::Parse(format!("unknown status '{}'", other))),
        }
    }
}

/// One gig, as stored in a single performances row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEvent {
    /// Empty for rows written before ids were stored.
    pub id: String,
    pub date: NaiveDate,
    pub venue: String,
    pub status: EventStatus,
    pub total_token: Option<Decimal>,
    pub notes: String,
    pub performers: Vec<String>,
    pub shared_per_person: Option<Decimal>,
    pub equipment_share: Option<Decimal>,
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| LedgerError::Parse(format!("invalid date '{}'", s)))
}

fn parse_amount(s: &str, field: &str) -> Result<Option<Decimal>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(s)
        .map(Some)
        .map_err(|e| LedgerError::Parse(format!("{}: {}", field, e)))
}

fn format_share(v: Option<Decimal>) -> String {
    v.map(|d| format!("{:.2}", d)).unwrap_or_default()
}

/// Splits a comma-joined performers cell.
pub fn split_performers(cell: &str) -> Vec<String> {
    normalize_performers(cell.split(','))
}

impl PerformanceEvent {
    pub fn performers_cell(&self) -> String {
        self.performers.join(", ")
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.venue.clone(),
            self.status.to_string(),
            self.total_token.map(|t| t.to_string()).unwrap_or_default(),
            format_share(self.shared_per_person),
            format_share(self.equipment_share),
            self.notes.clone(),
            self.performers_cell(),
            self.id.clone(),
        ]
    }

    pub fn from_row(row: &[String]) -> Result<Self> {
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
        Ok(PerformanceEvent {
            id: cell(COL_ID).trim().to_string(),
            date: parse_date(cell(COL_DATE))?,
            venue: cell(COL_VENUE).trim().to_string(),
            status: cell(COL_STATUS).parse()?,
            total_token: parse_amount(cell(COL_TOKEN), "total token")?,
            notes: cell(COL_NOTES).to_string(),
            performers: split_performers(cell(COL_PERFORMERS)),
            shared_per_person: parse_amount(cell(COL_SHARE), "shared per person")?,
            equipment_share: parse_amount(cell(COL_EQUIPMENT), "equipment share")?,
        })
    }

    pub fn is_done(&self) -> bool {
        self.status == EventStatus::Done
    }

    /// Brings the derived share columns in line with the status: computed from
    /// the current token and performers when Done, cleared when Upcoming.
    pub fn refresh_shares(&mut self) -> Result<Option<Allocation>> {
        self.performers = normalize_performers(&self.performers);
        match self.status {
            EventStatus::Upcoming => {
                self.shared_per_person = None;
                self.equipment_share = None;
                Ok(None)
            }
            EventStatus::Done => {
                let total = self.total_token.ok_or_else(|| {
                    LedgerError::validation("total token is required for a Done event")
                })?;
                let allocation = allocate(total, &self.performers)?;
                self.shared_per_person = Some(allocation.share_per_person);
                self.equipment_share = Some(allocation.equipment_share);
                Ok(Some(allocation))
            }
        }
    }

    pub fn validate_fields(&self) -> Result<()> {
        if self.venue.trim().is_empty() {
            return Err(LedgerError::validation("venue is required"));
        }
        if let Some(t) = self.total_token {
            if t.is_sign_negative() && !t.is_zero() {
                return Err(LedgerError::validation("total token cannot be negative"));
            }
        }
        Ok(())
    }
}
