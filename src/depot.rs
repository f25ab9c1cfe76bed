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

//! Chip depot.
//!
//! The [`Depot`] keeps every chip of one [`Fleet`] keyed by serial number and
//! applies [`ChipEvent`]s to them.
//!
//! # Thread Safety
//!
//! Chips are stored in a [`DashMap`], so events for different chips can be
//! applied in parallel. Fleet counters are updated under the fleet's lock.

use crate::base::SerialNumber;
use crate::{BikeChip, ChipError, ChipEvent, Firmware, Fleet};
use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::warn;

/// Collection of chips belonging to one fleet.
///
/// # Invariants
///
/// - Every stored chip was built by this depot's fleet.
/// - Serials are unique; a chip is never replaced once stored.
pub struct Depot {
    fleet: Fleet,
    chips: DashMap<SerialNumber, BikeChip>,
}

impl Depot {
    /// Creates an empty depot with a fresh fleet.
    pub fn new() -> Self {
        Self::with_fleet(Fleet::new())
    }

    /// Creates an empty depot that builds chips through `fleet`.
    pub fn with_fleet(fleet: Fleet) -> Self {
        Depot {
            fleet,
            chips: DashMap::new(),
        }
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Builds and stores one chip. Missing fields take their defaults: today,
    /// version 1.0, revision 0.
    ///
    /// # Errors
    ///
    /// Any construction error of [`BikeChip::new`].
    pub fn commission(
        &self,
        acquisition_date: Option<NaiveDate>,
        version: Option<Decimal>,
        revision: Option<u8>,
    ) -> Result<SerialNumber, ChipError> {
        let version = version.unwrap_or(Firmware::MIN_VERSION);
        let revision = revision.unwrap_or(Firmware::MIN_REVISION);
        let chip = match acquisition_date {
            Some(date) => BikeChip::new(&self.fleet, date, version, revision)?,
            None => BikeChip::with_firmware(&self.fleet, version, revision)?,
        };
        Ok(self.store(chip))
    }

    /// Builds and stores `quantity` default chips.
    ///
    /// # Errors
    ///
    /// Returns [`ChipError::InvalidQuantity`] if `quantity` is zero.
    pub fn stock(&self, quantity: usize) -> Result<Vec<SerialNumber>, ChipError> {
        let chips = self.fleet.manufacture(quantity)?;
        Ok(chips.into_iter().map(|chip| self.store(chip)).collect())
    }

    fn store(&self, chip: BikeChip) -> SerialNumber {
        let serial = chip.serial_number();
        debug_assert!(chip.fleet().same_fleet(&self.fleet));
        self.chips.insert(serial, chip);
        serial
    }

    /// Applies an event to the chip it names.
    ///
    /// | Event | Operation |
    /// |-------|-----------|
    /// | Rent | [`BikeChip::rent`] |
    /// | Ride | [`BikeChip::record_trip`], or the maximum trip when no distance |
    /// | Return | [`BikeChip::return_bike`] |
    /// | Upgrade | [`BikeChip::upgrade_firmware`], revision 0 when absent |
    /// | Reset | [`BikeChip::reset`] |
    ///
    /// # Errors
    ///
    /// - [`ChipError::UnknownChip`] - no chip has the event's serial.
    /// - Any error of the underlying chip operation.
    pub fn process(&self, event: ChipEvent) -> Result<(), ChipError> {
        let result = self.apply(event);
        if let Err(e) = &result {
            warn!(serial = %event.serial(), event = event.name(), error = %e, "event rejected");
        }
        result
    }

    fn apply(&self, event: ChipEvent) -> Result<(), ChipError> {
        let serial = event.serial();
        let mut chip = self
            .chips
            .get_mut(&serial)
            .ok_or(ChipError::UnknownChip(serial))?;

        match event {
            ChipEvent::Rent { .. } => chip.rent(),
            ChipEvent::Ride { distance_km, .. } => match distance_km {
                Some(distance_km) => chip.record_trip(distance_km).map(drop),
                None => chip.record_max_trip().map(drop),
            },
            ChipEvent::Return { .. } => chip.return_bike().map(drop),
            ChipEvent::Upgrade {
                version, revision, ..
            } => match revision {
                Some(revision) => chip.upgrade_firmware(version, revision),
                None => chip.upgrade_firmware_version(version),
            },
            ChipEvent::Reset { .. } => {
                chip.reset();
                Ok(())
            }
        }
    }

    /// Returns an iterator over all chips, in no particular order.
    pub fn chips(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, SerialNumber, BikeChip>> {
        self.chips.iter()
    }

    /// Retrieves a chip by serial.
    pub fn get_chip(
        &self,
        serial: &SerialNumber,
    ) -> Option<dashmap::mapref::one::Ref<'_, SerialNumber, BikeChip>> {
        self.chips.get(serial)
    }

    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }
}

impl Default for Depot {
    fn default() -> Self {
        Self::new()
    }
}
