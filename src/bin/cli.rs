//! statestore CLI
//!
//! Command-line tool for inspecting and merging store directories.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use statestore::codec::Codec;
use statestore::variant::{
    ranged_state, state, temporal_ranged_state, temporal_state, RangedStateCodec, StateCodec,
    TemporalRangedStateCodec, TemporalStateCodec,
};
use statestore::{FieldIndex, Result, Store, StoreOptions};

/// statestore CLI
#[derive(Parser, Debug)]
#[command(name = "statestore-cli")]
#[command(about = "Inspect and merge statestore directories")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Which key shape the store directory holds
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Variant {
    State,
    TemporalState,
    RangedState,
    TemporalRangedState,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count the records in a store
    Count {
        /// Store directory
        path: PathBuf,

        /// Key shape of the store
        #[arg(short, long, value_enum, default_value_t = Variant::State)]
        variant: Variant,
    },

    /// Print records as tab-separated rows
    Dump {
        /// Store directory
        path: PathBuf,

        /// Key shape of the store
        #[arg(short, long, value_enum, default_value_t = Variant::State)]
        variant: Variant,

        /// Stop after this many rows
        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// Merge a source store into a target store
    Merge {
        /// Target store directory (created if absent)
        target: PathBuf,

        /// Source store directory
        source: PathBuf,

        /// Key shape of both stores
        #[arg(short, long, value_enum, default_value_t = Variant::State)]
        variant: Variant,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Count { path, variant } => {
            let count = match variant {
                Variant::State => {
                    Store::open_ro(&path, StateCodec::new(), StoreOptions::default())?.count()?
                }
                Variant::TemporalState => {
                    Store::open_ro(&path, TemporalStateCodec::new(), StoreOptions::default())?
                        .count()?
                }
                Variant::RangedState => {
                    Store::open_ro(&path, RangedStateCodec::new(), StoreOptions::default())?
                        .count()?
                }
                Variant::TemporalRangedState => Store::open_ro(
                    &path,
                    TemporalRangedStateCodec::new(),
                    StoreOptions::default(),
                )?
                .count()?,
            };
            println!("{count}");
            Ok(())
        }

        Commands::Dump {
            path,
            variant,
            limit,
        } => {
            match variant {
                Variant::State => dump(
                    &Store::open_ro(&path, StateCodec::new(), StoreOptions::default())?,
                    &[state::fields::KEY, state::fields::VALUE_TYPE, state::fields::VALUE],
                    limit,
                ),
                Variant::TemporalState => dump(
                    &Store::open_ro(&path, TemporalStateCodec::new(), StoreOptions::default())?,
                    &[
                        temporal_state::fields::KEY,
                        temporal_state::fields::EFFECTIVE_TIME,
                        temporal_state::fields::VALUE_TYPE,
                        temporal_state::fields::VALUE,
                    ],
                    limit,
                ),
                Variant::RangedState => dump(
                    &Store::open_ro(&path, RangedStateCodec::new(), StoreOptions::default())?,
                    &[
                        ranged_state::fields::KEY_START,
                        ranged_state::fields::KEY_END,
                        ranged_state::fields::VALUE_TYPE,
                        ranged_state::fields::VALUE,
                    ],
                    limit,
                ),
                Variant::TemporalRangedState => dump(
                    &Store::open_ro(
                        &path,
                        TemporalRangedStateCodec::new(),
                        StoreOptions::default(),
                    )?,
                    &[
                        temporal_ranged_state::fields::KEY_START,
                        temporal_ranged_state::fields::KEY_END,
                        temporal_ranged_state::fields::EFFECTIVE_TIME,
                        temporal_ranged_state::fields::VALUE_TYPE,
                        temporal_ranged_state::fields::VALUE,
                    ],
                    limit,
                ),
            }
        }

        Commands::Merge {
            target,
            source,
            variant,
        } => {
            let written = match variant {
                Variant::State => {
                    Store::open_rw(&target, StateCodec::new(), StoreOptions::default())?
                        .merge(&source)?
                }
                Variant::TemporalState => {
                    Store::open_rw(&target, TemporalStateCodec::new(), StoreOptions::default())?
                        .merge(&source)?
                }
                Variant::RangedState => {
                    Store::open_rw(&target, RangedStateCodec::new(), StoreOptions::default())?
                        .merge(&source)?
                }
                Variant::TemporalRangedState => Store::open_rw(
                    &target,
                    TemporalRangedStateCodec::new(),
                    StoreOptions::default(),
                )?
                .merge(&source)?,
            };
            println!("merged {written} records");
            Ok(())
        }
    }
}

fn dump<C: Codec>(store: &Store<C>, field_names: &[&str], limit: Option<u64>) -> Result<()> {
    let mut index = FieldIndex::new();
    for name in field_names {
        index.create(name);
    }
    println!("{}", field_names.join("\t"));

    let mut printed = 0u64;
    store.search(
        &index,
        |_| true,
        |row| {
            if limit.map_or(true, |l| printed < l) {
                let cells: Vec<String> = row.iter().map(|cell| cell.as_text()).collect();
                println!("{}", cells.join("\t"));
                printed += 1;
            }
        },
    )?;
    Ok(())
}
