//! Performance mode: stepping through a chosen set list one song at a time.
//!
//! The cursor is a plain value owned by whoever drives the show. Each command
//! takes the current cursor and hands back the next one; nothing is kept in
//! process-wide state.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Largest set list performance mode accepts unless configured otherwise.
pub const DEFAULT_MAX_SELECTION: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceCursor {
    /// Song labels in performance order.
    pub queue: Vec<String>,
    pub position: usize,
}

/// Starts a show over `selection`, in the given order.
///
/// Blank entries and repeats are dropped. An empty set list, or one longer
/// than `max_selection`, is rejected.
pub fn start_performance<I, S>(selection: I, max_selection: usize) -> Result<PerformanceCursor>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut queue: Vec<String> = Vec::new();
    for track in selection {
        let track = track.as_ref().trim();
        if !track.is_empty() && !queue.iter().any(|t| t == track) {
            queue.push(track.to_string());
        }
    }
    if queue.is_empty() {
        return Err(LedgerError::validation("select at least one song"));
    }
    if queue.len() > max_selection {
        return Err(LedgerError::validation(format!(
            "select at most {} songs",
            max_selection
        )));
    }
    log::info!("performance started with {} songs", queue.len());
    Ok(PerformanceCursor { queue, position: 0 })
}

impl PerformanceCursor {
    /// Song being performed, or `None` once the set list is done.
    pub fn current(&self) -> Option<&str> {
        self.queue.get(self.position).map(String::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.queue.len()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.position)
    }

    /// Moves to the next song. Advancing a finished cursor leaves it finished.
    pub fn advance(self) -> Self {
        let position = (self.position + 1).min(self.queue.len());
        PerformanceCursor {
            queue: self.queue,
            position,
        }
    }
}

/// Ends the show and reports how many songs were performed.
pub fn end_performance(cursor: PerformanceCursor) -> usize {
    let performed = cursor.position.min(cursor.queue.len());
    log::info!(
        "performance ended after {} of {} songs",
        performed,
        cursor.queue.len()
    );
    performed
}
