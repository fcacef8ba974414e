use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::members::MEMBER_HEADER;
use crate::performance::PERFORMANCE_HEADER;
use crate::songs::SONG_HEADER;
use crate::store::{HEADER_ROWS, RecordStore};
use crate::videos::VIDEO_HEADER;

pub const LYRICS_SHEET: &str = "lyrics";
pub const MEMBERS_SHEET: &str = "members";
pub const VIDEOS_SHEET: &str = "videos";
pub const PERFORMANCES_SHEET: &str = "performances";

/// One named tab of the workbook: a header row followed by data rows.
///
/// Storage rows are 1-based and the header occupies row 1, so the data row at
/// index `i` lives at storage row `i + 2`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Worksheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Worksheet {
    pub fn create(name: &str, header: &[&str]) -> Self {
        Worksheet {
            name: name.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    fn data_index(&self, row_number: usize) -> Result<usize> {
        if row_number <= HEADER_ROWS || row_number > self.rows.len() + HEADER_ROWS {
            return Err(LedgerError::lookup(format!(
                "row {} is outside the data range of sheet '{}'",
                row_number, self.name
            )));
        }
        Ok(row_number - HEADER_ROWS - 1)
    }

    fn fit_row(&self, mut row: Vec<String>) -> Result<Vec<String>> {
        if row.len() > self.width() {
            return Err(LedgerError::validation(format!(
                "row has {} cells but sheet '{}' has {} columns",
                row.len(),
                self.name,
                self.width()
            )));
        }
        row.resize(self.width(), String::new());
        Ok(row)
    }
}

impl RecordStore for Worksheet {
    fn header(&self) -> Result<Vec<String>> {
        Ok(self.header.clone())
    }

    fn read_all(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.rows.clone())
    }

    fn ensure_columns(&mut self, header: &[&str]) -> Result<()> {
        if self.width() >= header.len() {
            return Ok(());
        }
        let added = &header[self.width()..];
        log::info!(
            "widening sheet '{}' with column(s) {}",
            self.name,
            added.join(", ")
        );
        self.header.extend(added.iter().map(|h| h.to_string()));
        let width = self.width();
        for row in self.rows.iter_mut() {
            row.resize(width, String::new());
        }
        Ok(())
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<()> {
        let row = self.fit_row(row)?;
        self.rows.push(row);
        Ok(())
    }

    fn update_row(&mut self, row_number: usize, row: Vec<String>) -> Result<()> {
        let index = self.data_index(row_number)?;
        let row = self.fit_row(row)?;
        self.rows[index] = row;
        Ok(())
    }

    fn delete_row(&mut self, row_number: usize) -> Result<()> {
        let index = self.data_index(row_number)?;
        self.rows.remove(index);
        Ok(())
    }
}

/// All worksheets the application keeps, persisted together as one file.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Workbook {
    pub worksheets: Vec<Worksheet>,
}

impl Workbook {
    /// Workbook with the four tabs the application reads, all empty.
    pub fn with_default_sheets() -> Self {
        Workbook {
            worksheets: vec![
                Worksheet::create(LYRICS_SHEET, SONG_HEADER),
                Worksheet::create(MEMBERS_SHEET, MEMBER_HEADER),
                Worksheet::create(VIDEOS_SHEET, VIDEO_HEADER),
                Worksheet::create(PERFORMANCES_SHEET, PERFORMANCE_HEADER),
            ],
        }
    }

    pub fn worksheet(&self, name: &str) -> Result<&Worksheet> {
        self.worksheets
            .iter()
            .find(|ws| ws.name == name)
            .ok_or_else(|| LedgerError::lookup(format!("worksheet '{}' not found", name)))
    }

    pub fn worksheet_mut(&mut self, name: &str) -> Result<&mut Worksheet> {
        self.worksheets
            .iter_mut()
            .find(|ws| ws.name == name)
            .ok_or_else(|| LedgerError::lookup(format!("worksheet '{}' not found", name)))
    }

    /// Replaces the worksheet with the same name, or adds it.
    pub fn put_worksheet(&mut self, worksheet: Worksheet) {
        match self.worksheets.iter_mut().find(|ws| ws.name == worksheet.name) {
            Some(existing) => *existing = worksheet,
            None => self.worksheets.push(worksheet),
        }
    }
}
