use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::sheet::Workbook;

/// Writes the workbook to a temporary file next to `filename` and renames it
/// into place, so the previous file survives any failure along the way.
pub fn save_workbook(workbook: &Workbook, filename: impl AsRef<Path>) -> Result<()> {
    let path = filename.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    let encoder = GzEncoder::new(tmp, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, workbook)?;
    let tmp = writer.into_inner().map_err(|e| e.into_error())?.finish()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

pub fn load_workbook(filename: impl AsRef<Path>) -> Result<Workbook> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let workbook: Workbook = deserialize_from(&mut reader)?;

    Ok(workbook)
}

/// Loads the workbook at `filename`, creating it with the default tabs first
/// if the file does not exist yet.
pub fn load_or_init(filename: impl AsRef<Path>) -> Result<Workbook> {
    let path = filename.as_ref();
    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let workbook = Workbook::with_default_sheets();
        save_workbook(&workbook, path)?;
        log::info!("created new workbook at {}", path.display());
        return Ok(workbook);
    }
    load_workbook(path)
}

// Serialize a workbook to a gzip'd in-memory buffer
pub fn serialize_to_memory(workbook: &Workbook) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, workbook)?;
    let buffer = writer.into_inner().map_err(|e| e.into_error())?.finish()?;

    Ok(buffer)
}

pub fn deserialize_from_memory(buffer: &[u8]) -> Result<Workbook> {
    let decoder = GzDecoder::new(std::io::Cursor::new(buffer));
    let mut reader = std::io::BufReader::new(decoder);

    let workbook: Workbook = deserialize_from(&mut reader)?;
    Ok(workbook)
}
