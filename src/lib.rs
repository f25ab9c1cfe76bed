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

//! # Bike Chip
//!
//! This library models the telemetry chip fitted to a rental bicycle: firmware
//! tracking, the rental lifecycle (rent, ride, return) and distance
//! bookkeeping, plus aggregate counters shared by every chip of a fleet.
//!
//! ## Core Components
//!
//! - [`BikeChip`]: One chip with validated construction and rental operations
//! - [`Fleet`]: Serial number generator and fleet-wide aggregates
//! - [`Depot`]: Chips keyed by serial, driven by [`ChipEvent`]s
//! - [`ChipError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use bike_chip_rs::{BikeChip, ErrorKind, Fleet};
//! use rust_decimal_macros::dec;
//!
//! let fleet = Fleet::new();
//! let mut chip = BikeChip::with_defaults(&fleet).unwrap();
//!
//! chip.rent().unwrap();
//! assert_eq!(chip.rent().unwrap_err().kind(), ErrorKind::InvalidState);
//!
//! chip.record_trip(dec!(50)).unwrap();
//! chip.return_bike().unwrap();
//! assert_eq!(chip.cumulative_rental_km(), dec!(50));
//! assert_eq!(fleet.chips_currently_rented(), 0);
//!
//! chip.upgrade_firmware(dec!(2.0), 0).unwrap();
//! assert_eq!(chip.version_revision(), "2.0.0");
//! ```
//!
//! ## Shared State
//!
//! Fleet aggregates live behind an `Arc`'d lock, not in globals. Two fleets
//! never see each other's serials or totals.

mod base;
pub mod chip;
mod depot;
pub mod error;
mod event;
mod fleet;

pub use base::{Firmware, SerialNumber};
pub use chip::{BikeChip, RentalRecord};
pub use depot::Depot;
pub use error::{ChipError, ErrorKind};
pub use event::ChipEvent;
pub use fleet::Fleet;
