use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::saving;

/// Number of header rows above the data in every worksheet.
pub const HEADER_ROWS: usize = 1;

/// Storage row number (1-based, header included) of the data row at `index`.
pub fn storage_row(index: usize) -> usize {
    index + HEADER_ROWS + 1
}

/// Ordered-row tabular store with one header row.
///
/// `row_number` arguments are storage row numbers as returned by
/// [`storage_row`]. Every write replaces whole rows; an implementation must
/// either apply the full row or fail without touching it.
pub trait RecordStore {
    fn header(&self) -> Result<Vec<String>>;
    fn read_all(&self) -> Result<Vec<Vec<String>>>;
    /// Appends the trailing columns of `header` the store does not have yet,
    /// padding existing rows with empty cells. Existing columns are kept.
    fn ensure_columns(&mut self, header: &[&str]) -> Result<()>;
    fn append_row(&mut self, row: Vec<String>) -> Result<()>;
    fn update_row(&mut self, row_number: usize, row: Vec<String>) -> Result<()>;
    fn delete_row(&mut self, row_number: usize) -> Result<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for &mut S {
    fn header(&self) -> Result<Vec<String>> {
        (**self).header()
    }

    fn read_all(&self) -> Result<Vec<Vec<String>>> {
        (**self).read_all()
    }

    fn ensure_columns(&mut self, header: &[&str]) -> Result<()> {
        (**self).ensure_columns(header)
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<()> {
        (**self).append_row(row)
    }

    fn update_row(&mut self, row_number: usize, row: Vec<String>) -> Result<()> {
        (**self).update_row(row_number, row)
    }

    fn delete_row(&mut self, row_number: usize) -> Result<()> {
        (**self).delete_row(row_number)
    }
}

/// One worksheet of a workbook file on disk.
///
/// Every call reloads the file, so each write is applied to the latest saved
/// state rather than to a copy cached by this process.
pub struct WorkbookFile {
    path: PathBuf,
    sheet: String,
}

impl WorkbookFile {
    pub fn new(path: impl AsRef<Path>, sheet: &str) -> Self {
        WorkbookFile {
            path: path.as_ref().to_path_buf(),
            sheet: sheet.to_string(),
        }
    }

    fn modify<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut crate::sheet::Worksheet) -> Result<()>,
    {
        let mut workbook = saving::load_workbook(&self.path)?;
        f(workbook.worksheet_mut(&self.sheet)?)?;
        saving::save_workbook(&workbook, &self.path)?;
        Ok(())
    }
}

impl RecordStore for WorkbookFile {
    fn header(&self) -> Result<Vec<String>> {
        let workbook = saving::load_workbook(&self.path)?;
        Ok(workbook.worksheet(&self.sheet)?.header.clone())
    }

    fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let workbook = saving::load_workbook(&self.path)?;
        Ok(workbook.worksheet(&self.sheet)?.rows.clone())
    }

    fn ensure_columns(&mut self, header: &[&str]) -> Result<()> {
        if self.header()?.len() >= header.len() {
            return Ok(());
        }
        self.modify(|ws| ws.ensure_columns(header))
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<()> {
        self.modify(|ws| ws.append_row(row))
    }

    fn update_row(&mut self, row_number: usize, row: Vec<String>) -> Result<()> {
        self.modify(|ws| ws.update_row(row_number, row))
    }

    fn delete_row(&mut self, row_number: usize) -> Result<()> {
        self.modify(|ws| ws.delete_row(row_number))
    }
}
