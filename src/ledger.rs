use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::allocation::{Allocation, normalize_performers};
use crate::error::{LedgerError, Result};
use crate::members::MemberDirectory;
use crate::performance::{EventStatus, PERFORMANCE_HEADER, PerformanceEvent, parse_date};
use crate::store::{RecordStore, storage_row};

/// Product rules applied by the ledger on top of the row format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// At most one Upcoming performance may exist at a time.
    #[serde(default = "default_single_upcoming")]
    pub single_upcoming: bool,
    /// Performers must be listed in the member directory.
    #[serde(default)]
    pub require_known_performers: bool,
}

fn default_single_upcoming() -> bool {
    true
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        LedgerPolicy {
            single_upcoming: default_single_upcoming(),
            require_known_performers: false,
        }
    }
}

/// How a caller names a stored event.
///
/// `Date` only exists for rows written before ids were stored and fails when
/// more than one row carries the date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKey {
    Id(String),
    Date(NaiveDate),
}

impl EventKey {
    /// A date-shaped key is a date, anything else is an id.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LedgerError::validation("event key cannot be empty"));
        }
        Ok(match parse_date(s) {
            Ok(date) => EventKey::Date(date),
            Err(_) => EventKey::Id(s.to_string()),
        })
    }

    fn matches(&self, event: &PerformanceEvent) -> bool {
        match self {
            EventKey::Id(id) => event.id == *id,
            EventKey::Date(date) => event.date == *date,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Id(id) => write!(f, "id {}", id),
            EventKey::Date(date) => write!(f, "date {}", date),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventDraft {
    pub date: NaiveDate,
    pub venue: String,
    #[serde(default = "default_status")]
    pub status: EventStatus,
    #[serde(default)]
    pub total_token: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub performers: Vec<String>,
}

fn default_status() -> EventStatus {
    EventStatus::Upcoming
}

/// Field changes for an event that is still Upcoming. `None` keeps the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub date: Option<NaiveDate>,
    pub venue: Option<String>,
    pub status: Option<EventStatus>,
    pub total_token: Option<Decimal>,
    pub notes: Option<String>,
    pub performers: Option<Vec<String>>,
}

/// What gets recorded when a gig is settled.
#[derive(Debug, Clone, Deserialize)]
pub struct Settlement {
    pub total_token: Decimal,
    pub performers: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<Settlement> for EventPatch {
    fn from(s: Settlement) -> Self {
        EventPatch {
            status: Some(EventStatus::Done),
            total_token: Some(s.total_token),
            performers: Some(s.performers),
            notes: s.notes,
            ..EventPatch::default()
        }
    }
}

/// Performance event lifecycle on top of a [`RecordStore`].
///
/// Every operation reads a fresh snapshot, validates, and only then writes a
/// single whole row. Shares are recomputed from the current token and
/// performers on every write that leaves an event Done.
pub struct Ledger<S: RecordStore> {
    store: S,
    policy: LedgerPolicy,
    directory: Option<MemberDirectory>,
}

impl<S: RecordStore> Ledger<S> {
    pub fn new(store: S, policy: LedgerPolicy) -> Self {
        Ledger {
            store,
            policy,
            directory: None,
        }
    }

    /// Directory used when `require_known_performers` is set.
    pub fn with_directory(mut self, directory: MemberDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn events(&self) -> Result<Vec<PerformanceEvent>> {
        read_events(&self.store)
    }

    /// The first Upcoming event in store order.
    pub fn upcoming(&self) -> Result<Option<PerformanceEvent>> {
        Ok(self.events()?.into_iter().find(|e| !e.is_done()))
    }

    pub fn find(&self, key: &EventKey) -> Result<PerformanceEvent> {
        let events = self.events()?;
        let index = resolve(&events, key)?;
        Ok(events[index].clone())
    }

    pub fn create(&mut self, draft: EventDraft) -> Result<PerformanceEvent> {
        let mut event = PerformanceEvent {
            id: Uuid::new_v4().to_string(),
            date: draft.date,
            venue: draft.venue.trim().to_string(),
            status: draft.status,
            total_token: draft.total_token,
            notes: draft.notes,
            performers: normalize_performers(&draft.performers),
            shared_per_person: None,
            equipment_share: None,
        };
        event.validate_fields()?;
        self.check_performers(&event.performers)?;

        if event.status == EventStatus::Upcoming && self.policy.single_upcoming {
            if let Some(existing) = self.upcoming()? {
                log::warn!(
                    "rejecting new upcoming performance on {}: {} at {} is still upcoming",
                    event.date,
                    existing.date,
                    existing.venue
                );
                return Err(LedgerError::validation(
                    "an upcoming performance already exists",
                ));
            }
        }

        let allocation = event.refresh_shares()?;
        self.store.ensure_columns(PERFORMANCE_HEADER)?;
        self.store.append_row(event.to_row())?;
        log_saved("created", &event, allocation.as_ref());
        Ok(event)
    }

    /// Upcoming -> Done.
    pub fn mark_done(
        &mut self,
        key: &EventKey,
        settlement: Settlement,
    ) -> Result<(PerformanceEvent, Allocation)> {
        let (event, allocation) = self.write_patch(key, settlement.into())?;
        let allocation = allocation
            .ok_or_else(|| LedgerError::validation("performance was not settled"))?;
        Ok((event, allocation))
    }

    /// Applies `patch` to an Upcoming event and writes the full row back.
    ///
    /// Done events cannot be edited. If the patch leaves the event Done, this
    /// is the Upcoming -> Done transition and the shares are computed here.
    pub fn edit(&mut self, key: &EventKey, patch: EventPatch) -> Result<PerformanceEvent> {
        self.write_patch(key, patch).map(|(event, _)| event)
    }

    fn write_patch(
        &mut self,
        key: &EventKey,
        patch: EventPatch,
    ) -> Result<(PerformanceEvent, Option<Allocation>)> {
        let events = self.events()?;
        let index = resolve(&events, key)?;
        let original = &events[index];
        if original.is_done() {
            log::warn!("rejecting edit of settled performance {}", key);
            return Err(LedgerError::validation(
                "performance is already Done and cannot be changed",
            ));
        }

        let mut updated = original.clone();
        if let Some(date) = patch.date {
            updated.date = date;
        }
        if let Some(venue) = patch.venue {
            updated.venue = venue.trim().to_string();
        }
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if let Some(token) = patch.total_token {
            updated.total_token = Some(token);
        }
        if let Some(notes) = patch.notes {
            updated.notes = notes;
        }
        if let Some(performers) = patch.performers {
            updated.performers = normalize_performers(&performers);
        }
        if updated.id.is_empty() {
            updated.id = Uuid::new_v4().to_string();
        }

        updated.validate_fields()?;
        self.check_performers(&updated.performers)?;
        let allocation = updated.refresh_shares()?;

        self.ensure_unchanged(index, original, key)?;
        self.store.ensure_columns(PERFORMANCE_HEADER)?;
        self.store
            .update_row(storage_row(index), updated.to_row())?;
        log_saved("updated", &updated, allocation.as_ref());
        Ok((updated, allocation))
    }

    /// Removes an Upcoming event. Done events are kept.
    pub fn delete(&mut self, key: &EventKey) -> Result<PerformanceEvent> {
        let events = self.events()?;
        let index = resolve(&events, key)?;
        let event = &events[index];
        if event.is_done() {
            log::warn!("rejecting delete of settled performance {}", key);
            return Err(LedgerError::validation(
                "only upcoming performances can be deleted",
            ));
        }

        self.ensure_unchanged(index, event, key)?;
        self.store.delete_row(storage_row(index))?;
        log::info!(
            "deleted upcoming performance {} at {} (row {})",
            event.date,
            event.venue,
            storage_row(index)
        );
        Ok(event.clone())
    }

    fn check_performers(&self, performers: &[String]) -> Result<()> {
        if !self.policy.require_known_performers {
            return Ok(());
        }
        match &self.directory {
            Some(directory) => directory.validate_performers(performers),
            None => Err(LedgerError::validation(
                "member directory is required to validate performers",
            )),
        }
    }

    // The row at `index` must still hold the event read at the start of the
    // operation; otherwise another writer got there first.
    fn ensure_unchanged(
        &self,
        index: usize,
        expected: &PerformanceEvent,
        key: &EventKey,
    ) -> Result<()> {
        let rows = self.store.read_all()?;
        let current = rows
            .get(index)
            .map(|row| PerformanceEvent::from_row(row))
            .transpose()?;
        match current {
            Some(ref event) if event == expected => Ok(()),
            _ => {
                log::error!(
                    "row {} no longer holds performance {}; aborting write",
                    storage_row(index),
                    key
                );
                Err(LedgerError::lookup(format!(
                    "performance {} changed while it was being saved",
                    key
                )))
            }
        }
    }
}

/// Decodes every data row of a performances store, failing on the first
/// malformed row. The error names that row's storage row number.
pub fn read_events<S: RecordStore>(store: &S) -> Result<Vec<PerformanceEvent>> {
    store
        .read_all()?
        .iter()
        .enumerate()
        .map(|(i, row)| {
            PerformanceEvent::from_row(row).map_err(|e| match e {
                LedgerError::Parse(msg) => {
                    LedgerError::Parse(format!("row {}: {}", storage_row(i), msg))
                }
                other => other,
            })
        })
        .collect()
}

/// Index of the single snapshot row matching `key`.
pub fn resolve(events: &[PerformanceEvent], key: &EventKey) -> Result<usize> {
    let mut matches = events
        .iter()
        .enumerate()
        .filter(|(_, e)| key.matches(e))
        .map(|(i, _)| i);
    match (matches.next(), matches.next()) {
        (Some(index), None) => Ok(index),
        (None, _) => Err(LedgerError::lookup(format!(
            "no performance found for {}",
            key
        ))),
        (Some(_), Some(_)) => Err(LedgerError::lookup(format!(
            "more than one performance matches {}; use the event id",
            key
        ))),
    }
}

fn log_saved(action: &str, event: &PerformanceEvent, allocation: Option<&Allocation>) {
    match allocation {
        Some(a) => log::info!(
            "{} {} performance {} at {}: {} shares of {} ({} undistributed)",
            action,
            event.status,
            event.date,
            event.venue,
            a.total_shares,
            a.share_per_person,
            a.undistributed
        ),
        None => log::info!(
            "{} {} performance {} at {}",
            action,
            event.status,
            event.date,
            event.venue
        ),
    }
}
