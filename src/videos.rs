use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::store::RecordStore;

pub const VIDEO_HEADER: &[&str] = &["Title", "Description", "VideoLink"];

lazy_static! {
    static ref DRIVE_ID_REGEX: Regex = Regex::new(r"/d/([^/?#]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub title: String,
    pub description: String,
    pub video_link: String,
}

impl Video {
    fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        Video {
            title: cell(0),
            description: cell(1),
            video_link: cell(2),
        }
    }

    pub fn is_drive_link(&self) -> bool {
        self.video_link.contains("drive.google.com")
    }

    /// Link suitable for an embedded player. Google Drive share links are
    /// rewritten to their `/preview` form; anything else is returned as is.
    pub fn embed_url(&self) -> Result<String> {
        if !self.is_drive_link() {
            return Ok(self.video_link.clone());
        }
        let id = DRIVE_ID_REGEX
            .captures(&self.video_link)
            .and_then(|c| c.get(1))
            .ok_or_else(|| LedgerError::Parse("Unable to display Google Drive video".to_string()))?;
        Ok(format!("https://drive.google.com/file/d/{}/preview", id.as_str()))
    }
}

pub fn load_videos<S: RecordStore>(store: &S) -> Result<Vec<Video>> {
    Ok(store
        .read_all()?
        .iter()
        .map(|row| Video::from_row(row))
        .filter(|v| !v.video_link.is_empty())
        .collect())
}
