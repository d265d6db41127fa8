//! Command-line arguments and the run mode they select.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, error::ErrorKind};
use hnsync_core::{IdSelection, ItemId};

#[derive(Parser, Debug)]
#[command(
  name = "hnsync",
  version,
  about = "Mirror Hacker News items and users into SQLite",
  after_help = "\
With only <DB>, catches up from the newest stored item and then follows live
updates. <ID> or <ID,ID,...> fetches those items; <START> <END> fetches the
range from START down to END."
)]
pub struct Args {
  /// SQLite database file; created if missing.
  pub db: PathBuf,

  /// An item ID, a comma-separated list of IDs, or the START of a range.
  pub target: Option<String>,

  /// The END of a range; must not exceed START.
  pub end: Option<String>,

  /// Path to a TOML config file (default: ./hnsync.toml if present).
  #[arg(short, long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// Fetch every ID below the newest stored item that is not stored.
  #[arg(long)]
  pub missing: bool,

  /// Fetch the profile of every stored author without a user row.
  #[arg(long)]
  pub users: bool,

  /// Keep already stored rows instead of replacing them.
  #[arg(long)]
  pub insert_only: bool,
}

/// What a single invocation does.
#[derive(Debug, PartialEq, Eq)]
pub enum Mode {
  /// Catch up, then follow the update feed.
  Sync,
  /// Fetch a fixed selection of items once.
  Items(IdSelection),
  /// Fill holes in the stored ID space.
  Gaps,
  /// Fetch missing author profiles.
  Authors,
}

impl Args {
  /// Resolve the mode, rejecting contradictory combinations before any I/O.
  pub fn mode(&self) -> Result<Mode, clap::Error> {
    let mode = match (&self.target, &self.end) {
      _ if self.missing && self.users => {
        return Err(usage(ErrorKind::ArgumentConflict, "--missing and --users are exclusive"));
      }
      (Some(_), _) if self.missing || self.users => {
        return Err(usage(
          ErrorKind::ArgumentConflict,
          "item IDs cannot be combined with --missing or --users",
        ));
      }
      (None, _) if self.missing => Mode::Gaps,
      (None, _) if self.users => Mode::Authors,
      (None, _) => Mode::Sync,
      (Some(list), None) => Mode::Items(IdSelection::parse_list(list).map_err(invalid)?),
      (Some(start), Some(end)) => {
        let selection = IdSelection::range(parse_id(start)?, parse_id(end)?).map_err(invalid)?;
        Mode::Items(selection)
      }
    };

    if self.insert_only && mode == Mode::Sync {
      return Err(usage(
        ErrorKind::ArgumentConflict,
        "--insert-only applies to one-shot runs only",
      ));
    }
    Ok(mode)
  }
}

fn parse_id(raw: &str) -> Result<ItemId, clap::Error> {
  match raw.trim().parse::<ItemId>() {
    Ok(id) if id >= 1 => Ok(id),
    _ => Err(usage(
      ErrorKind::ValueValidation,
      &format!("range bounds must be single positive IDs, got {raw:?}"),
    )),
  }
}

fn invalid(e: hnsync_core::Error) -> clap::Error { usage(ErrorKind::ValueValidation, &e.to_string()) }

fn usage(kind: ErrorKind, message: &str) -> clap::Error { Args::command().error(kind, message) }
