// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use bike_chip_rs::{ChipEvent, Depot, SerialNumber};
use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{Level, info, warn};

/// Bike Chip - Replay chip event CSV files
///
/// Reads chip events from a CSV file and outputs chip states to stdout.
/// Supports commissioning, rentals, rides, returns, firmware upgrades and resets.
#[derive(Parser, Debug)]
#[command(name = "bike-chip")]
#[command(about = "Replays rental chip event CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with events
    ///
    /// Expected format: op,chip,distance,version,revision,date
    /// Example: cargo run -- events.csv > chips.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Default chips to manufacture before replaying (serials 1..=N)
    #[arg(long, default_value_t = 0)]
    fleet_size: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let depot = match replay_events(BufReader::new(file), args.fleet_size) {
        Ok(depot) => depot,
        Err(e) => {
            eprintln!("Error replaying events: {}", e);
            process::exit(1);
        }
    };

    let fleet = depot.fleet();
    info!(
        chips = fleet.total_chips_created(),
        rented = fleet.chips_currently_rented(),
        total_km = %fleet.total_distance_km(),
        "fleet summary"
    );

    if let Err(e) = write_chips(&depot, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, chip, distance, version, revision, date`
///
/// Empty columns deserialize to `None`; a value that does not parse fails the
/// whole row.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default)]
    chip: Option<u32>,
    #[serde(default)]
    distance: Option<Decimal>,
    #[serde(default)]
    version: Option<Decimal>,
    #[serde(default)]
    revision: Option<u8>,
    #[serde(default)]
    date: Option<NaiveDate>,
}

/// What a single row asks the depot to do.
#[derive(Debug, PartialEq)]
enum Action {
    Commission {
        date: Option<NaiveDate>,
        version: Option<Decimal>,
        revision: Option<u8>,
    },
    Event(ChipEvent),
}

impl CsvRecord {
    /// Converts CSV record to an action.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_action(self) -> Option<Action> {
        let op = self.op.to_lowercase();
        if op == "commission" {
            return Some(Action::Commission {
                date: self.date,
                version: self.version,
                revision: self.revision,
            });
        }

        let serial = SerialNumber(self.chip?);
        let event = match op.as_str() {
            "rent" => ChipEvent::Rent { serial },
            "ride" => ChipEvent::Ride {
                serial,
                distance_km: self.distance,
            },
            "return" => ChipEvent::Return { serial },
            "upgrade" => ChipEvent::Upgrade {
                serial,
                version: self.version?,
                revision: self.revision,
            },
            "reset" => ChipEvent::Reset { serial },
            _ => return None,
        };
        Some(Action::Event(event))
    }
}

/// Replay chip events from a CSV reader.
///
/// Rows are streamed, so arbitrarily long event logs are fine. Malformed rows
/// (including columns that fail to parse) and rejected events are skipped and
/// logged.
///
/// # CSV Format
///
/// Expected columns: `op, chip, distance, version, revision, date`
/// - `op`: commission, rent, ride, return, upgrade or reset
/// - `chip`: Serial number (required except for commission)
/// - `distance`: Trip km for `ride`; empty rides the maximum
/// - `version`, `revision`: Firmware for `commission` and `upgrade`
/// - `date`: Acquisition date (`YYYY-MM-DD`) for `commission`; empty means today
///
/// # Example
///
/// ```csv
/// op,chip,distance,version,revision,date
/// commission,,,2.0,1,2021-04-01
/// rent,1,,,,
/// ride,1,12.5,,,
/// return,1,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn replay_events<R: Read>(reader: R, fleet_size: usize) -> Result<Depot, csv::Error> {
    let depot = Depot::new();
    if fleet_size > 0 {
        if let Err(e) = depot.stock(fleet_size) {
            warn!(error = %e, "could not stock fleet");
        }
    }

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
                continue;
            }
        };

        let Some(action) = record.into_action() else {
            warn!("skipping invalid event record");
            continue;
        };

        // Rejected events are logged by the depot itself.
        match action {
            Action::Commission {
                date,
                version,
                revision,
            } => {
                if let Err(e) = depot.commission(date, version, revision) {
                    warn!(error = %e, "skipping commission");
                }
            }
            Action::Event(event) => {
                if depot.process(event).is_err() {
                    continue;
                }
            }
        }
    }

    Ok(depot)
}

/// Write chip states to a CSV writer, ordered by serial.
///
/// # CSV Format
///
/// Columns: `serial, acquired, firmware, rented, total_km, trip_km, rental_km, last_rental_km`
///
/// # Example
///
/// ```csv
/// serial,acquired,firmware,rented,total_km,trip_km,rental_km,last_rental_km
/// 1,2021-04-01,2.0.1,false,12.5,0,12.5,12.5
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_chips<W: Write>(depot: &Depot, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut chips: Vec<_> = depot.chips().collect();
    chips.sort_by_key(|chip| *chip.key());
    for chip in &chips {
        wtr.serialize(chip.value())?;
    }

    wtr.flush()?;
    Ok(())
}
