/*!
# SIBuskerz Gig Ledger

Song lyrics, member profiles, performance mode and a token-sharing ledger for
a busker group, kept in a workbook of spreadsheet-style tabs.

## Overview

Every gig is a row in the `performances` tab. While a gig is Upcoming its
row can be edited or deleted freely. When it is marked Done, the token
collected is split into one share per performer plus one share held back
for equipment, and the row is frozen. Lifetime earnings per member are
derived from the Done rows whenever they are asked for and are never stored.

## Architecture

### Core
- **allocation** - Share arithmetic for one gig (`n + 1` shares, two decimal
  places, rounding residual reported as undistributed)
- **performance** - The performance event and its fixed A..I row layout
- **ledger** - Lifecycle: create, edit, Upcoming -> Done, delete, with row
  identity checked before every write
- **earnings** - Per-member earnings and ledger-wide totals

### Record store
- **store** - `RecordStore` trait (header row + ordered data rows) and the
  file-backed `WorkbookFile`
- **sheet** - In-memory `Worksheet` and `Workbook`
- **saving** - Workbook persistence with bincode and gzip compression
- **loader** / **downloader** - CSV import, CSV and XLSX export

### Around the ledger
- **members** - Read-only member directory used to validate performers
- **songs** - Lyrics catalog, search and new-song entry
- **videos** - Past performance gallery links
- **session** - Caller-owned performance-mode cursor
- **config** - File and environment settings
- **app** - JSON HTTP API (`web` feature)

## Row layout of `performances`

| Col | Field |
|-----|-------|
| A | Date (`YYYY-MM-DD`) |
| B | Venue |
| C | Status (`Upcoming` / `Done`) |
| D | TotalToken |
| E | SharedPerPerson |
| F | EquipmentShare |
| G | Notes |
| H | Performers (comma-joined) |
| I | Id |
*/

pub mod allocation;
pub mod config;
pub mod downloader;
pub mod earnings;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod members;
pub mod performance;
pub mod saving;
pub mod session;
pub mod sheet;
pub mod songs;
pub mod store;
pub mod videos;

#[cfg(feature = "web")]
pub mod app;

pub use allocation::{Allocation, allocate, normalize_performers};
pub use earnings::{LedgerSummary, MemberEarning, member_earnings, summarize};
pub use error::{LedgerError, Result};
pub use ledger::{EventDraft, EventKey, EventPatch, Ledger, LedgerPolicy, Settlement};
pub use performance::{EventStatus, PerformanceEvent};
pub use session::{PerformanceCursor, end_performance, start_performance};
pub use sheet::{Workbook, Worksheet};
pub use store::{RecordStore, WorkbookFile};
