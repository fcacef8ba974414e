#![cfg(not(tarpaulin_include))]

use csv::WriterBuilder;

use crate::error::{LedgerError, Result};
use crate::sheet::Worksheet;
#[cfg(feature = "web")]
use crate::sheet::Workbook;

/// Convert a worksheet to CSV format
///
/// Writes the header row followed by every data row. Quoting of commas,
/// quotes and newlines (lyrics are multi-line) is left to the CSV writer.
///
/// # Arguments
/// * `sheet` - Reference to the worksheet to convert
///
/// # Returns
/// * `Result<String>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use buskerz::sheet::Worksheet;
/// use buskerz::downloader::to_csv;
///
/// let sheet = Worksheet::create("lyrics", &["Title", "Artist", "Lyrics"]);
/// let csv = to_csv(&sheet).unwrap();
/// assert_eq!(csv, "Title,Artist,Lyrics\n");
/// ```
pub fn to_csv(sheet: &Worksheet) -> Result<String> {
    let mut wtr = WriterBuilder::new().flexible(true).from_writer(Vec::new());

    wtr.write_record(&sheet.header)?;
    for row in &sheet.rows {
        wtr.write_record(row)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| LedgerError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| LedgerError::Parse(e.to_string()))
}

/// Convert a workbook to XLSX format
///
/// Every worksheet becomes an Excel tab with its header in the first row.
/// Cells that parse as numbers (token amounts, shares) are written as numbers
/// so that Excel can sum them; everything else is written as text.
///
/// # Arguments
/// * `workbook` - Reference to the workbook to convert
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an error
/// Token columns, the only ones exported as spreadsheet numbers.
#[cfg(feature = "web")]
const NUMERIC_COLUMNS: &[&str] = &["TotalToken", "SharedPerPerson", "EquipmentShare"];

#[cfg(feature = "web")]
fn numeric_cell(column: &str, value: &str) -> Option<f64> {
    if !NUMERIC_COLUMNS.contains(&column) {
        return None;
    }
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(feature = "web")]
pub fn to_xlsx(workbook: &Workbook) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet as XlsxWorksheet};

    let xlsx_err = |e: rust_xlsxwriter::XlsxError| LedgerError::ExternalService(e.to_string());

    let mut xlsx = XlsxWorkbook::new();

    for sheet in &workbook.worksheets {
        let mut worksheet = XlsxWorksheet::new();
        worksheet.set_name(&sheet.name).map_err(xlsx_err)?;

        for (c, title) in sheet.header.iter().enumerate() {
            worksheet.write_string(0, c as u16, title).map_err(xlsx_err)?;
        }
        for (r, row) in sheet.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, value) in row.iter().enumerate() {
                let column = sheet.header.get(c).map(String::as_str).unwrap_or("");
                match numeric_cell(column, value) {
                    Some(n) => {
                        worksheet.write_number(r, c as u16, n).map_err(xlsx_err)?;
                    }
                    None => {
                        worksheet.write_string(r, c as u16, value).map_err(xlsx_err)?;
                    }
                }
            }
        }

        xlsx.push_worksheet(worksheet);
    }

    let buffer = xlsx.save_to_buffer().map_err(xlsx_err)?;

    Ok(buffer)
}
