use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::store::RecordStore;

pub const SONG_HEADER: &[&str] = &["Title", "Artist", "Lyrics"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub artist: String,
    pub lyrics: String,
}

impl Song {
    /// `"<Title> - <Artist>"`, the label songs are picked by.
    pub fn label(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }

    fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Song {
            title: cell(0),
            artist: cell(1),
            lyrics: cell(2),
        }
    }
}

/// Songs from the lyrics worksheet, sorted by title (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct SongCatalog {
    songs: Vec<Song>,
}

impl SongCatalog {
    pub fn from_songs(mut songs: Vec<Song>) -> Self {
        songs.sort_by_key(|s| s.title.to_lowercase());
        SongCatalog { songs }
    }

    pub fn load<S: RecordStore>(store: &S) -> Result<Self> {
        let songs = store
            .read_all()?
            .iter()
            .map(|row| Song::from_row(row))
            .filter(|s| !s.title.trim().is_empty())
            .collect();
        Ok(Self::from_songs(songs))
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    /// Case-insensitive substring match on the label. A blank term keeps
    /// every song.
    pub fn search(&self, term: &str) -> Vec<&Song> {
        let term = term.trim().to_lowercase();
        self.songs
            .iter()
            .filter(|s| term.is_empty() || s.label().to_lowercase().contains(&term))
            .collect()
    }

    pub fn find(&self, label: &str) -> Option<&Song> {
        self.songs.iter().find(|s| s.label() == label)
    }
}

/// Appends a song after trimming every field. All three are required.
pub fn add_song<S: RecordStore>(
    store: &mut S,
    title: &str,
    artist: &str,
    lyrics: &str,
) -> Result<Song> {
    let song = Song {
        title: title.trim().to_string(),
        artist: artist.trim().to_string(),
        lyrics: lyrics.trim().to_string(),
    };
    if song.title.is_empty() || song.artist.is_empty() || song.lyrics.is_empty() {
        return Err(LedgerError::validation("please complete all fields"));
    }
    store.append_row(vec![
        song.title.clone(),
        song.artist.clone(),
        song.lyrics.clone(),
    ])?;
    log::info!("added song '{}'", song.label());
    Ok(song)
}
