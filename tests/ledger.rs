use std::cell::Cell;
use std::io::Cursor;

use buskerz::error::{LedgerError, Result};
use buskerz::ledger::{EventDraft, EventKey, EventPatch, Ledger, LedgerPolicy, Settlement};
use buskerz::loader::from_csv_reader;
use buskerz::members::{Member, MemberDirectory};
use buskerz::performance::{EventStatus, PERFORMANCE_HEADER};
use buskerz::sheet::{PERFORMANCES_SHEET, Worksheet};
use buskerz::store::RecordStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;

fn d(s: &str) -> Decimal {
    s.parse().expect("decimal")
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).expect("date")
}

fn sheet() -> Worksheet {
    Worksheet::create(PERFORMANCES_SHEET, PERFORMANCE_HEADER)
}

fn draft(day: u32, venue: &str) -> EventDraft {
    EventDraft {
        date: date(day),
        venue: venue.to_string(),
        status: EventStatus::Upcoming,
        total_token: None,
        notes: String::new(),
        performers: Vec::new(),
    }
}

fn settlement(token: &str, performers: &[&str]) -> Settlement {
    Settlement {
        total_token: d(token),
        performers: performers.iter().map(|p| p.to_string()).collect(),
        notes: None,
    }
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

#[test]
fn upcoming_event_has_no_shares() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let event = ledger.create(draft(1, "Central Market")).expect("create");

    assert_eq!(event.status, EventStatus::Upcoming);
    assert!(event.shared_per_person.is_none());
    assert!(event.equipment_share.is_none());
    assert!(!event.id.is_empty());

    let stored = &ws.rows[0];
    assert_eq!(stored[0], "2024-06-01");
    assert_eq!(stored[2], "Upcoming");
    assert_eq!(stored[4], "");
    assert_eq!(stored[5], "");
}

#[test]
fn marking_done_writes_the_full_row_in_place() {
    let mut ws = sheet();
    {
        let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
        let event = ledger.create(draft(1, "Central Market")).expect("create");
        let (done, allocation) = ledger
            .mark_done(
                &EventKey::Id(event.id.clone()),
                settlement("100", &["Ali", " Bee ", "Cat"]),
            )
            .expect("mark done");
        assert_eq!(done.id, event.id);
        assert_eq!(allocation.share_per_person, d("25"));
        assert_eq!(done.shared_per_person, Some(d("25")));
        assert_eq!(done.equipment_share, Some(d("25")));
    }

    assert_eq!(ws.rows.len(), 1);
    let id = ws.rows[0][8].clone();
    assert_eq!(
        ws.rows[0],
        row(&[
            "2024-06-01",
            "Central Market",
            "Done",
            "100",
            "25.00",
            "25.00",
            "",
            "Ali, Bee, Cat",
            id.as_str(),
        ])
    );
}

#[test]
fn marking_done_without_performers_changes_nothing() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let event = ledger.create(draft(1, "Central Market")).expect("create");
    let before = ledger.events().expect("events");

    let err = ledger
        .mark_done(&EventKey::Id(event.id.clone()), settlement("100", &["  ", ""]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(ledger.events().expect("events"), before);
}

#[test]
fn creating_done_computes_shares_immediately() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let mut draft = draft(2, "Bukit Bintang");
    draft.status = EventStatus::Done;
    draft.total_token = Some(d("100"));
    draft.performers = vec!["Ali".to_string(), "Bee".to_string()];

    let event = ledger.create(draft).expect("create");
    assert_eq!(event.shared_per_person, Some(d("33.33")));
    assert_eq!(event.equipment_share, Some(d("33.33")));
}

#[test]
fn creating_done_without_token_is_rejected() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let mut draft = draft(2, "Bukit Bintang");
    draft.status = EventStatus::Done;
    draft.performers = vec!["Ali".to_string()];

    assert!(matches!(
        ledger.create(draft),
        Err(LedgerError::Validation(_))
    ));
    assert!(ws.rows.is_empty());
}

#[test]
fn only_one_upcoming_event_by_default() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    ledger.create(draft(1, "Central Market")).expect("first");
    assert!(matches!(
        ledger.create(draft(8, "KLCC Park")),
        Err(LedgerError::Validation(_))
    ));

    let relaxed = LedgerPolicy {
        single_upcoming: false,
        ..LedgerPolicy::default()
    };
    let mut ledger = Ledger::new(&mut ws, relaxed);
    ledger.create(draft(8, "KLCC Park")).expect("second allowed");
    assert_eq!(ledger.events().expect("events").len(), 2);
    assert_eq!(
        ledger.upcoming().expect("upcoming").map(|e| e.venue),
        Some("Central Market".to_string())
    );
}

#[test]
fn editing_upcoming_keeps_shares_unset() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let event = ledger.create(draft(1, "Central Market")).expect("create");

    let patch = EventPatch {
        venue: Some("  Pasar Seni ".to_string()),
        total_token: Some(d("80")),
        performers: Some(vec!["Ali".to_string(), "Bee".to_string()]),
        ..EventPatch::default()
    };
    let edited = ledger
        .edit(&EventKey::Id(event.id.clone()), patch)
        .expect("edit");
    assert_eq!(edited.venue, "Pasar Seni");
    assert_eq!(edited.total_token, Some(d("80")));
    assert!(edited.shared_per_person.is_none());
    assert_eq!(ledger.find(&EventKey::Id(event.id)).expect("find"), edited);
}

#[test]
fn edit_that_sets_done_recomputes_from_current_values() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let event = ledger.create(draft(1, "Central Market")).expect("create");
    let key = EventKey::Id(event.id);

    ledger
        .edit(
            &key,
            EventPatch {
                total_token: Some(d("90")),
                performers: Some(vec!["Ali".to_string(), "Bee".to_string()]),
                ..EventPatch::default()
            },
        )
        .expect("edit");
    let done = ledger
        .edit(
            &key,
            EventPatch {
                status: Some(EventStatus::Done),
                ..EventPatch::default()
            },
        )
        .expect("settle");
    assert_eq!(done.shared_per_person, Some(d("30")));
}

#[test]
fn done_events_cannot_be_edited_or_deleted() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let event = ledger.create(draft(1, "Central Market")).expect("create");
    let key = EventKey::Id(event.id);
    ledger
        .mark_done(&key, settlement("100", &["Ali"]))
        .expect("mark done");

    assert!(matches!(
        ledger.edit(&key, EventPatch::default()),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        ledger.mark_done(&key, settlement("200", &["Ali"])),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(ledger.delete(&key), Err(LedgerError::Validation(_))));
    assert_eq!(ledger.events().expect("events").len(), 1);
}

#[test]
fn deleting_upcoming_removes_it() {
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let mut settled = draft(1, "Central Market");
    settled.status = EventStatus::Done;
    settled.total_token = Some(d("10"));
    settled.performers = vec!["Ali".to_string()];
    ledger.create(settled).expect("done");
    let event = ledger.create(draft(9, "KLCC Park")).expect("upcoming");

    let deleted = ledger.delete(&EventKey::Id(event.id.clone())).expect("delete");
    assert_eq!(deleted.venue, "KLCC Park");

    let events = ledger.events().expect("events");
    assert_eq!(events.len(), 1);
    assert!(events.iter().all(|e| e.id != event.id));
    assert!(matches!(
        ledger.delete(&EventKey::Id(event.id)),
        Err(LedgerError::Lookup(_))
    ));
}

#[test]
fn legacy_rows_resolve_by_date_and_gain_an_id() {
    let mut ws = sheet();
    ws.append_row(row(&[
        "2024-06-03", "Old Town", "Upcoming", "", "", "", "from the old sheet", "Ali,Bee",
    ]))
    .expect("append");

    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let key = EventKey::parse("2024-06-03").expect("key");
    assert_eq!(key, EventKey::Date(date(3)));

    let (done, _) = ledger
        .mark_done(&key, settlement("30", &["Ali", "Bee"]))
        .expect("mark done");
    assert_eq!(done.notes, "from the old sheet");
    assert!(!done.id.is_empty());
    assert_eq!(ws.rows[0][8], done.id);
    assert_eq!(ws.rows[0][4], "10.00");
}

#[test]
fn unknown_or_ambiguous_keys_fail_without_writing() {
    let mut ws = sheet();
    ws.append_row(row(&["2024-06-03", "A", "Upcoming"])).expect("append");
    ws.append_row(row(&["2024-06-03", "B", "Upcoming"])).expect("append");
    let before = ws.rows.clone();

    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    assert!(matches!(
        ledger.delete(&EventKey::Date(date(3))),
        Err(LedgerError::Lookup(_))
    ));
    assert!(matches!(
        ledger.mark_done(&EventKey::Date(date(4)), settlement("10", &["Ali"])),
        Err(LedgerError::Lookup(_))
    ));
    assert!(matches!(
        ledger.edit(&EventKey::Id("nope".to_string()), EventPatch::default()),
        Err(LedgerError::Lookup(_))
    ));
    assert_eq!(ws.rows, before);
}

#[test]
fn unknown_performers_rejected_when_required() {
    let directory = MemberDirectory::new(vec![Member {
        name: "Ali".to_string(),
        photo: String::new(),
        role: "Vocals".to_string(),
        bio: String::new(),
    }]);
    let policy = LedgerPolicy {
        require_known_performers: true,
        ..LedgerPolicy::default()
    };
    let mut ws = sheet();
    let mut ledger = Ledger::new(&mut ws, policy).with_directory(directory);
    let event = ledger.create(draft(1, "Central Market")).expect("create");
    let key = EventKey::Id(event.id);

    let err = ledger
        .mark_done(&key, settlement("20", &["Ali", "Zed"]))
        .unwrap_err();
    assert!(err.to_string().contains("Zed"));
    ledger
        .mark_done(&key, settlement("20", &["Ali"]))
        .expect("known performer");
}

/// Store whose row 1 is rewritten by "another session" after the first read.
struct RacingStore {
    inner: Worksheet,
    reads: Cell<usize>,
    writes: usize,
}

impl RecordStore for RacingStore {
    fn header(&self) -> Result<Vec<String>> {
        self.inner.header()
    }

    fn read_all(&self) -> Result<Vec<Vec<String>>> {
        let reads = self.reads.get() + 1;
        self.reads.set(reads);
        let mut rows = self.inner.read_all()?;
        if reads > 1 {
            rows[0][0] = "2024-06-30".to_string();
        }
        Ok(rows)
    }

    fn ensure_columns(&mut self, header: &[&str]) -> Result<()> {
        self.inner.ensure_columns(header)
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<()> {
        self.writes += 1;
        self.inner.append_row(row)
    }

    fn update_row(&mut self, row_number: usize, row: Vec<String>) -> Result<()> {
        self.writes += 1;
        self.inner.update_row(row_number, row)
    }

    fn delete_row(&mut self, row_number: usize) -> Result<()> {
        self.writes += 1;
        self.inner.delete_row(row_number)
    }
}

#[test]
fn concurrent_change_aborts_the_write() {
    let mut inner = sheet();
    inner
        .append_row(row(&["2024-06-03", "Old Town", "Upcoming", "", "", "", "", "Ali"]))
        .expect("append");
    let store = RacingStore {
        inner,
        reads: Cell::new(0),
        writes: 0,
    };

    let mut ledger = Ledger::new(store, LedgerPolicy::default());
    let err = ledger
        .mark_done(&EventKey::Date(date(3)), settlement("10", &["Ali"]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Lookup(_)));

    let store = ledger.into_store();
    assert_eq!(store.writes, 0);
    assert_eq!(store.inner.rows[0][2], "Upcoming");
}

#[test]
fn drafts_and_settlements_accept_api_json() {
    let draft: EventDraft = serde_json::from_str(
        r#"{"date": "2024-06-14", "venue": "Pasar Seni", "performers": ["Ali"]}"#,
    )
    .expect("draft");
    assert_eq!(draft.status, EventStatus::Upcoming);
    assert_eq!(draft.date, date(14));

    let settlement: Settlement =
        serde_json::from_str(r#"{"total_token": 100.5, "performers": ["Ali", "Bee"]}"#)
            .expect("number token");
    assert_eq!(settlement.total_token, d("100.5"));

    let settlement: Settlement =
        serde_json::from_str(r#"{"total_token": "42", "performers": []}"#).expect("string token");
    assert_eq!(settlement.total_token, d("42"));
}

#[test]
fn imported_sheet_without_id_column_is_widened_on_write() {
    let csv = "Date,Venue,Status,TotalToken,SharedPerPerson,EquipmentShare,Notes,Performers\n\
               2024-06-03,Old Town,Upcoming,,,,,Ali\n\
               2024-05-20,Pasar Seni,Done,90,30.00,30.00,,\"Ali, Bee\"\n";
    let mut ws = from_csv_reader(PERFORMANCES_SHEET, Cursor::new(csv)).expect("import");
    assert_eq!(ws.width(), 8);

    let mut ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    let (done, allocation) = ledger
        .mark_done(
            &EventKey::parse("2024-06-03").expect("key"),
            settlement("30", &["Ali", "Bee"]),
        )
        .expect("mark done");
    assert_eq!(allocation.share_per_person, d("10"));
    assert!(!done.id.is_empty());

    assert_eq!(ws.header, row(PERFORMANCE_HEADER));
    assert_eq!(ws.rows[0][8], done.id);
    assert_eq!(ws.rows[0][4], "10.00");
    // the older row keeps its cells and gains an empty id
    assert_eq!(ws.rows[1].len(), 9);
    assert_eq!(ws.rows[1][7], "Ali, Bee");
    assert_eq!(ws.rows[1][8], "");
}

#[test]
fn malformed_rows_are_reported_by_storage_row() {
    let mut ws = sheet();
    ws.append_row(row(&["2024-06-03", "Old Town", "Upcoming"]))
        .expect("append");
    ws.append_row(row(&["03.06.24", "Pasar Seni", "Done", "90"]))
        .expect("append");

    let ledger = Ledger::new(&mut ws, LedgerPolicy::default());
    match ledger.events() {
        Err(LedgerError::Parse(msg)) => {
            assert!(msg.starts_with("row 3:"), "{}", msg);
            assert!(msg.contains("03.06.24"), "{}", msg);
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}
