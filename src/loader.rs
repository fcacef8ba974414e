#![cfg(not(tarpaulin_include))]

use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{LedgerError, Result};
use crate::sheet::Worksheet;

/// Load a worksheet from CSV data
///
/// The first record is taken as the header row; every following record
/// becomes a data row. Short records are padded with empty cells so that
/// every row has the header's width.
///
/// # Arguments
/// * `name` - Name the resulting worksheet is given
/// * `reader` - Source of the CSV text
///
/// # Returns
/// * `Result<Worksheet>` - The parsed worksheet, or an error if the data
///   is empty or a record is wider than the header
pub fn from_csv_reader<R: Read>(name: &str, reader: R) -> Result<Worksheet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if header.is_empty() || header.iter().all(|h| h.is_empty()) {
        return Err(LedgerError::Parse("CSV data has no header row".to_string()));
    }

    let mut worksheet = Worksheet {
        name: name.to_string(),
        header,
        rows: Vec::new(),
    };

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() > worksheet.width() {
            return Err(LedgerError::Parse(format!(
                "CSV row {} has {} cells but the header has {}",
                i + 2,
                record.len(),
                worksheet.width()
            )));
        }
        let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        row.resize(worksheet.width(), String::new());
        worksheet.rows.push(row);
    }

    Ok(worksheet)
}

/// Load a worksheet from a CSV file
///
/// # Examples
/// ```no_run
/// use buskerz::loader::from_csv;
///
/// match from_csv("members.csv", "members") {
///     Ok(sheet) => println!("Loaded {} members", sheet.rows.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>, name: &str) -> Result<Worksheet> {
    let file = File::open(filepath)?;
    from_csv_reader(name, file)
}
