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

//! Fleet-wide counters shared by every chip of a fleet.
//!
//! A [`Fleet`] is a cheap, cloneable handle. Each chip keeps one, so rentals
//! and returns update the aggregates of the fleet that built the chip and no
//! other.
//!
//! # Example
//!
//! ```
//! use bike_chip_rs::Fleet;
//!
//! let fleet = Fleet::new();
//! let chips = fleet.manufacture(3).unwrap();
//! assert_eq!(fleet.total_chips_created(), 3);
//! assert_eq!(chips[2].serial_number().to_string(), "3");
//! ```

use crate::base::SerialNumber;
use crate::{BikeChip, ChipError};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct FleetTotals {
    next_serial: u32,
    chips_created: u32,
    chips_rented: u32,
    total_distance_km: Decimal,
}

impl FleetTotals {
    fn new() -> Self {
        Self {
            next_serial: 1,
            chips_created: 0,
            chips_rented: 0,
            total_distance_km: Decimal::ZERO,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.chips_rented <= self.chips_created,
            "Invariant violated: {} rented out of {} created",
            self.chips_rented,
            self.chips_created
        );
        debug_assert!(
            self.total_distance_km >= Decimal::ZERO,
            "Invariant violated: fleet distance went negative: {}",
            self.total_distance_km
        );
    }
}

/// Shared registry of serial numbers and fleet aggregates.
#[derive(Debug, Clone)]
pub struct Fleet {
    totals: Arc<Mutex<FleetTotals>>,
}

impl Fleet {
    pub fn new() -> Self {
        Self {
            totals: Arc::new(Mutex::new(FleetTotals::new())),
        }
    }

    /// Number of chips built by this fleet so far.
    pub fn total_chips_created(&self) -> u32 {
        self.totals.lock().chips_created
    }

    /// Number of chips currently out on a rental.
    pub fn chips_currently_rented(&self) -> u32 {
        self.totals.lock().chips_rented
    }

    /// Distance of every returned rental across the fleet.
    pub fn total_distance_km(&self) -> Decimal {
        self.totals.lock().total_distance_km
    }

    /// Serial the next chip will receive.
    pub fn next_serial(&self) -> SerialNumber {
        SerialNumber(self.totals.lock().next_serial)
    }

    /// Builds `quantity` chips with today's date and default firmware.
    ///
    /// # Errors
    ///
    /// Returns [`ChipError::InvalidQuantity`] if `quantity` is zero.
    pub fn manufacture(&self, quantity: usize) -> Result<Vec<BikeChip>, ChipError> {
        if quantity < 1 {
            return Err(ChipError::InvalidQuantity(quantity));
        }
        let chips = (0..quantity)
            .map(|_| BikeChip::with_defaults(self))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(quantity, "manufactured chip batch");
        Ok(chips)
    }

    /// Hands out the next serial and counts the chip as created.
    pub(crate) fn allocate_serial(&self) -> SerialNumber {
        let mut totals = self.totals.lock();
        let serial = SerialNumber(totals.next_serial);
        totals.next_serial += 1;
        totals.chips_created += 1;
        totals.assert_invariants();
        serial
    }

    pub(crate) fn rental_started(&self) {
        let mut totals = self.totals.lock();
        totals.chips_rented += 1;
        totals.assert_invariants();
    }

    pub(crate) fn rental_returned(&self, distance_km: Decimal) {
        let mut totals = self.totals.lock();
        totals.chips_rented = totals.chips_rented.saturating_sub(1);
        totals.total_distance_km += distance_km;
        totals.assert_invariants();
    }

    /// Drops a rental without crediting its distance (chip reset mid-rental).
    pub(crate) fn rental_abandoned(&self) {
        let mut totals = self.totals.lock();
        totals.chips_rented = totals.chips_rented.saturating_sub(1);
        totals.assert_invariants();
    }

    /// True when both handles point at the same counters.
    pub fn same_fleet(&self, other: &Fleet) -> bool {
        Arc::ptr_eq(&self.totals, &other.totals)
    }
}

impl Default for Fleet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn serials_start_at_one() {
        let fleet = Fleet::new();
        assert_eq!(fleet.allocate_serial(), SerialNumber(1));
        assert_eq!(fleet.allocate_serial(), SerialNumber(2));
        assert_eq!(fleet.next_serial(), SerialNumber(3));
        assert_eq!(fleet.total_chips_created(), 2);
    }

    #[test]
    fn clones_share_counters() {
        let fleet = Fleet::new();
        let handle = fleet.clone();
        handle.allocate_serial();
        assert_eq!(fleet.total_chips_created(), 1);
        assert!(fleet.same_fleet(&handle));
        assert!(!fleet.same_fleet(&Fleet::new()));
    }

    #[test]
    fn return_credits_distance_and_releases_rental() {
        let fleet = Fleet::new();
        fleet.allocate_serial();
        fleet.rental_started();
        assert_eq!(fleet.chips_currently_rented(), 1);

        fleet.rental_returned(dec!(12.5));
        assert_eq!(fleet.chips_currently_rented(), 0);
        assert_eq!(fleet.total_distance_km(), dec!(12.5));
    }

    #[test]
    fn abandoned_rental_credits_nothing() {
        let fleet = Fleet::new();
        fleet.allocate_serial();
        fleet.rental_started();
        fleet.rental_abandoned();
        assert_eq!(fleet.chips_currently_rented(), 0);
        assert_eq!(fleet.total_distance_km(), Decimal::ZERO);
    }

    #[test]
    fn manufacture_zero_rejected() {
        let fleet = Fleet::new();
        assert_eq!(
            fleet.manufacture(0).unwrap_err(),
            ChipError::InvalidQuantity(0)
        );
        assert_eq!(fleet.total_chips_created(), 0);
    }
}
