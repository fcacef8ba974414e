#![cfg(not(tarpaulin_include))]

use buskerz::config::AppConfig;
use buskerz::error::{LedgerError, Result};
use buskerz::ledger::{EventDraft, EventKey, EventPatch, Ledger, Settlement};
use buskerz::members::MemberDirectory;
use buskerz::performance::{EventStatus, PerformanceEvent, split_performers};
use buskerz::sheet::{LYRICS_SHEET, MEMBERS_SHEET, PERFORMANCES_SHEET};
use buskerz::songs::{self, SongCatalog};
use buskerz::store::WorkbookFile;
use buskerz::{downloader, earnings, loader, saving};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "buskerz", version, about = "Gig ledger for the SIBuskerz busker group")]
struct Cli {
    /// Workbook file (defaults to the configured workbook_path)
    #[arg(short = 'w', long = "workbook")]
    workbook: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty workbook if none exists
    Init,
    /// Replace a worksheet with the contents of a CSV file
    Import {
        #[arg(long)]
        sheet: String,
        #[arg(long)]
        file: String,
    },
    /// Write one worksheet as CSV to stdout
    Export {
        #[arg(long)]
        sheet: String,
    },
    /// List every performance
    Events,
    /// Record a new performance
    AddEvent {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        venue: String,
        /// Record it as already Done
        #[arg(long)]
        done: bool,
        #[arg(long)]
        token: Option<Decimal>,
        /// Comma-separated member names
        #[arg(long, default_value = "")]
        performers: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Change an upcoming performance
    Edit {
        /// Event id, or date for rows without an id
        key: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        token: Option<Decimal>,
        #[arg(long)]
        performers: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Settle an upcoming performance
    Done {
        key: String,
        #[arg(long)]
        token: Decimal,
        #[arg(long)]
        performers: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete an upcoming performance
    Delete { key: String },
    /// Lifetime earnings per member
    Earnings,
    /// Ledger totals
    Summary,
    /// List members
    Members,
    /// List or search songs
    Songs {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Add a song to the lyrics tab
    AddSong {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        /// File containing the lyrics
        #[arg(long)]
        lyrics_file: String,
    },
}

fn print_event(e: &PerformanceEvent) {
    let money = |d: Option<Decimal>| d.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".into());
    println!(
        "{}  {:<8} {:<24} token {:>8}  share {:>8}  [{}]  {}",
        e.date,
        e.status,
        e.venue,
        money(e.total_token),
        money(e.shared_per_person),
        e.performers.join(", "),
        e.id
    );
}

fn open_ledger(path: &str, config: &AppConfig) -> Result<Ledger<WorkbookFile>> {
    saving::load_or_init(path)?;
    let directory = MemberDirectory::load(&WorkbookFile::new(path, MEMBERS_SHEET))?;
    Ok(Ledger::new(WorkbookFile::new(path, PERFORMANCES_SHEET), config.ledger)
        .with_directory(directory))
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load().map_err(|e| LedgerError::Parse(e.to_string()))?;
    let path = cli.workbook.unwrap_or_else(|| config.workbook_path.clone());

    match cli.command {
        Command::Init => {
            saving::load_or_init(&path)?;
            println!("workbook ready at {}", path);
        }
        Command::Import { sheet, file } => {
            let mut workbook = saving::load_or_init(&path)?;
            let worksheet = loader::from_csv(&file, &sheet)?;
            println!("imported {} rows into '{}'", worksheet.rows.len(), sheet);
            workbook.put_worksheet(worksheet);
            saving::save_workbook(&workbook, &path)?;
        }
        Command::Export { sheet } => {
            let workbook = saving::load_or_init(&path)?;
            print!("{}", downloader::to_csv(workbook.worksheet(&sheet)?)?);
        }
        Command::Events => {
            for e in open_ledger(&path, &config)?.events()? {
                print_event(&e);
            }
        }
        Command::AddEvent {
            date,
            venue,
            done,
            token,
            performers,
            notes,
        } => {
            let draft = EventDraft {
                date,
                venue,
                status: if done {
                    EventStatus::Done
                } else {
                    EventStatus::Upcoming
                },
                total_token: token,
                notes,
                performers: split_performers(&performers),
            };
            let event = open_ledger(&path, &config)?.create(draft)?;
            print_event(&event);
        }
        Command::Edit {
            key,
            date,
            venue,
            token,
            performers,
            notes,
        } => {
            let patch = EventPatch {
                date,
                venue,
                status: None,
                total_token: token,
                notes,
                performers: performers.as_deref().map(split_performers),
            };
            let event = open_ledger(&path, &config)?.edit(&EventKey::parse(&key)?, patch)?;
            print_event(&event);
        }
        Command::Done {
            key,
            token,
            performers,
            notes,
        } => {
            let settlement = Settlement {
                total_token: token,
                performers: split_performers(&performers),
                notes,
            };
            let (event, a) =
                open_ledger(&path, &config)?.mark_done(&EventKey::parse(&key)?, settlement)?;
            print_event(&event);
            println!(
                "{} shares: {:.2} each, equipment {:.2}, distributed {:.2}, undistributed {:.2}",
                a.total_shares, a.share_per_person, a.equipment_share, a.distributed, a.undistributed
            );
        }
        Command::Delete { key } => {
            let event = open_ledger(&path, &config)?.delete(&EventKey::parse(&key)?)?;
            println!("deleted:");
            print_event(&event);
        }
        Command::Earnings => {
            let events = open_ledger(&path, &config)?.events()?;
            for e in earnings::member_earnings(&events) {
                println!("{:<24} {:>10.2}", e.name, e.total);
            }
        }
        Command::Summary => {
            let s = earnings::summarize(&open_ledger(&path, &config)?.events()?);
            println!("done gigs:        {}", s.done_events);
            println!("upcoming gigs:    {}", s.upcoming_events);
            println!("total token:      {:.2}", s.total_token);
            println!("paid to members:  {:.2}", s.paid_to_performers);
            println!("equipment fund:   {:.2}", s.equipment_fund);
            println!("undistributed:    {:.2}", s.undistributed);
        }
        Command::Members => {
            saving::load_or_init(&path)?;
            let directory = MemberDirectory::load(&WorkbookFile::new(&path, MEMBERS_SHEET))?;
            for m in directory.members() {
                println!("{:<24} {}", m.name, m.role);
            }
        }
        Command::Songs { search } => {
            saving::load_or_init(&path)?;
            let catalog = SongCatalog::load(&WorkbookFile::new(&path, LYRICS_SHEET))?;
            for song in catalog.search(&search) {
                println!("{}", song.label());
            }
        }
        Command::AddSong {
            title,
            artist,
            lyrics_file,
        } => {
            saving::load_or_init(&path)?;
            let lyrics = std::fs::read_to_string(&lyrics_file)?;
            let mut store = WorkbookFile::new(&path, LYRICS_SHEET);
            let song = songs::add_song(&mut store, &title, &artist, &lyrics)?;
            println!("'{}' has been added", song.label());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
