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

//! Bike chip entity.
//!
//! Implemented State Machine
//!
//! ```text
//!  Idle ──rent──► Rented ──return──► Idle
//!   │               │
//!   │               └──record_trip──► Rented (distance accrues)
//!   └──upgrade_firmware──► Idle (strictly newer firmware)
//! ```
//!
//! `reset` returns a chip to `Idle` with factory firmware from either state.
//!
//! # Example
//!
//! ```
//! use bike_chip_rs::{BikeChip, Fleet};
//! use rust_decimal_macros::dec;
//!
//! let fleet = Fleet::new();
//! let mut chip = BikeChip::with_defaults(&fleet).unwrap();
//! chip.rent().unwrap();
//! chip.record_trip(dec!(12.5)).unwrap();
//! chip.return_bike().unwrap();
//! assert_eq!(chip.total_distance_km(), dec!(12.5));
//! assert_eq!(fleet.total_distance_km(), dec!(12.5));
//! ```

use crate::base::{Firmware, SerialNumber};
use crate::{ChipError, Fleet};
use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A completed rental window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentalRecord {
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub distance_km: Decimal,
}

/// Mutable telemetry. Everything here is cleared by a reset.
#[derive(Debug, Clone, PartialEq)]
struct ChipData {
    firmware: Firmware,
    /// Start of the active rental; `Some` exactly while rented.
    rented_since: Option<NaiveDateTime>,
    total_km: Decimal,
    /// Distance of the active rental.
    trip_km: Decimal,
    /// Lifetime distance ridden under rentals.
    rental_km: Decimal,
    last_rental: Option<RentalRecord>,
}

impl ChipData {
    fn new(firmware: Firmware) -> Self {
        Self {
            firmware,
            rented_since: None,
            total_km: Decimal::ZERO,
            trip_km: Decimal::ZERO,
            rental_km: Decimal::ZERO,
            last_rental: None,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.firmware.version() >= Firmware::MIN_VERSION
                && self.firmware.version() <= Firmware::MAX_VERSION
                && self.firmware.revision() <= Firmware::MAX_REVISION,
            "Invariant violated: firmware out of range: {}",
            self.firmware
        );
        debug_assert!(
            self.trip_km >= Decimal::ZERO && self.trip_km <= self.rental_km,
            "Invariant violated: trip distance {} outside [0, {}]",
            self.trip_km,
            self.rental_km
        );
        debug_assert!(
            self.rented_since.is_some() || self.trip_km == Decimal::ZERO,
            "Invariant violated: idle chip carries trip distance {}",
            self.trip_km
        );
    }

    fn is_rented(&self) -> bool {
        self.rented_since.is_some()
    }

    /// Opens a rental window.
    fn rent(&mut self, now: NaiveDateTime) -> Result<(), ChipError> {
        if self.is_rented() {
            return Err(ChipError::AlreadyRented);
        }
        self.rented_since = Some(now);
        self.assert_invariants();
        Ok(())
    }

    /// Closes the rental window and hands back its record.
    fn finish_rental(&mut self, now: NaiveDateTime) -> Result<RentalRecord, ChipError> {
        let started_at = self.rented_since.ok_or(ChipError::NotRented)?;
        let record = RentalRecord {
            started_at,
            ended_at: now,
            distance_km: self.trip_km,
        };
        self.rented_since = None;
        self.trip_km = Decimal::ZERO;
        self.last_rental = Some(record);
        self.assert_invariants();
        Ok(record)
    }

    /// Accrues a trip into every distance counter.
    fn ride(&mut self, distance_km: Decimal) -> Result<Decimal, ChipError> {
        if !self.is_rented() {
            return Err(ChipError::NotRented);
        }
        if distance_km < Decimal::ZERO || distance_km > BikeChip::MAX_TRIP_KM {
            return Err(ChipError::InvalidDistance(distance_km));
        }
        self.trip_km += distance_km;
        self.rental_km += distance_km;
        self.total_km += distance_km;
        self.assert_invariants();
        Ok(self.rental_km)
    }

    /// Installs strictly newer firmware.
    fn upgrade(&mut self, version: Decimal, revision: u8) -> Result<(), ChipError> {
        if self.is_rented() {
            return Err(ChipError::UpgradeWhileRented);
        }
        let requested = Firmware::new(version, revision)?;
        if requested <= self.firmware {
            return Err(ChipError::NotAnUpgrade {
                current: self.firmware,
                requested,
            });
        }
        self.firmware = requested;
        self.assert_invariants();
        Ok(())
    }

    /// Clears all telemetry. Returns whether a rental was in progress.
    fn reset(&mut self) -> bool {
        let was_rented = self.is_rented();
        *self = ChipData::new(Firmware::DEFAULT);
        was_rented
    }
}

/// Chip fitted to a rental bicycle.
///
/// Identity (serial and acquisition date) is fixed at construction. All other
/// state goes through the validated operations below, which check everything
/// before writing anything.
#[derive(Debug)]
pub struct BikeChip {
    serial: SerialNumber,
    acquired_on: NaiveDate,
    fleet: Fleet,
    data: ChipData,
}

impl BikeChip {
    /// Longest distance accepted for a single trip.
    pub const MAX_TRIP_KM: Decimal = dec!(140);

    /// Chips acquired before this date are not accepted.
    pub const EARLIEST_ACQUISITION: NaiveDate = match NaiveDate::from_ymd_opt(2020, 6, 15) {
        Some(date) => date,
        None => panic!("invalid earliest acquisition date"),
    };

    const DECIMAL_PRECISION: u32 = 2;

    /// Builds a chip acquired on `acquisition_date` running the given firmware.
    ///
    /// # Errors
    ///
    /// - [`ChipError::AcquisitionDateTooEarly`] - date before 2020-06-15.
    /// - [`ChipError::AcquisitionDateInFuture`] - date after today.
    /// - [`ChipError::VersionOutOfRange`] - version outside `[1.0, 10.9]`.
    /// - [`ChipError::RevisionOutOfRange`] - revision outside `[0, 9]`.
    pub fn new(
        fleet: &Fleet,
        acquisition_date: NaiveDate,
        version: Decimal,
        revision: u8,
    ) -> Result<Self, ChipError> {
        if acquisition_date < Self::EARLIEST_ACQUISITION {
            return Err(ChipError::AcquisitionDateTooEarly(acquisition_date));
        }
        if acquisition_date > Local::now().date_naive() {
            return Err(ChipError::AcquisitionDateInFuture(acquisition_date));
        }
        let firmware = Firmware::new(version, revision)?;

        // Serial is taken only once every check has passed.
        let serial = fleet.allocate_serial();
        debug!(%serial, %acquisition_date, %firmware, "chip created");

        Ok(Self {
            serial,
            acquired_on: acquisition_date,
            fleet: fleet.clone(),
            data: ChipData::new(firmware),
        })
    }

    /// Builds a chip acquired today.
    pub fn with_firmware(fleet: &Fleet, version: Decimal, revision: u8) -> Result<Self, ChipError> {
        Self::new(fleet, Local::now().date_naive(), version, revision)
    }

    /// Builds a chip acquired today with factory firmware.
    pub fn with_defaults(fleet: &Fleet) -> Result<Self, ChipError> {
        Self::with_firmware(
            fleet,
            Firmware::DEFAULT.version(),
            Firmware::DEFAULT.revision(),
        )
    }

    pub fn serial_number(&self) -> SerialNumber {
        self.serial
    }

    pub fn acquisition_date(&self) -> NaiveDate {
        self.acquired_on
    }

    pub fn firmware(&self) -> Firmware {
        self.data.firmware
    }

    pub fn firmware_version(&self) -> Decimal {
        self.data.firmware.version()
    }

    pub fn firmware_revision(&self) -> u8 {
        self.data.firmware.revision()
    }

    /// Firmware as `version.revision`, e.g. `"1.0.0"`.
    pub fn version_revision(&self) -> String {
        self.data.firmware.to_string()
    }

    pub fn is_rented(&self) -> bool {
        self.data.is_rented()
    }

    pub fn total_distance_km(&self) -> Decimal {
        self.data.total_km
    }

    /// Start of the active rental, if any, in UTC.
    pub fn current_rental_start(&self) -> Option<NaiveDateTime> {
        self.data.rented_since
    }

    /// Distance ridden during the active rental.
    pub fn current_trip_km(&self) -> Decimal {
        self.data.trip_km
    }

    pub fn last_rental(&self) -> Option<RentalRecord> {
        self.data.last_rental
    }

    pub fn last_rental_start(&self) -> Option<NaiveDateTime> {
        self.data.last_rental.map(|rental| rental.started_at)
    }

    pub fn last_rental_end(&self) -> Option<NaiveDateTime> {
        self.data.last_rental.map(|rental| rental.ended_at)
    }

    /// Distance of the last completed rental, zero if there was none.
    pub fn last_rental_km(&self) -> Decimal {
        self.data
            .last_rental
            .map_or(Decimal::ZERO, |rental| rental.distance_km)
    }

    /// Lifetime distance ridden under rentals.
    pub fn cumulative_rental_km(&self) -> Decimal {
        self.data.rental_km
    }

    /// Fleet this chip reports to.
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Checks the bicycle out.
    ///
    /// # Errors
    ///
    /// Returns [`ChipError::AlreadyRented`] if a rental is already open.
    pub fn rent(&mut self) -> Result<(), ChipError> {
        self.data.rent(Utc::now().naive_utc())?;
        self.fleet.rental_started();
        debug!(serial = %self.serial, "rental started");
        Ok(())
    }

    /// Checks the bicycle back in, crediting the trip to the fleet total.
    ///
    /// # Errors
    ///
    /// Returns [`ChipError::NotRented`] if no rental is open.
    pub fn return_bike(&mut self) -> Result<RentalRecord, ChipError> {
        let record = self.data.finish_rental(Utc::now().naive_utc())?;
        self.fleet.rental_returned(record.distance_km);
        debug!(serial = %self.serial, distance_km = %record.distance_km, "rental returned");
        Ok(record)
    }

    /// Records a trip of `distance_km` and returns the lifetime rental distance.
    ///
    /// # Errors
    ///
    /// - [`ChipError::NotRented`] - no rental is open.
    /// - [`ChipError::InvalidDistance`] - distance negative or above 140 km.
    pub fn record_trip(&mut self, distance_km: Decimal) -> Result<Decimal, ChipError> {
        self.data.ride(distance_km)
    }

    /// Records a trip of [`Self::MAX_TRIP_KM`].
    pub fn record_max_trip(&mut self) -> Result<Decimal, ChipError> {
        self.record_trip(Self::MAX_TRIP_KM)
    }

    /// Installs firmware `version.revision`.
    ///
    /// # Errors
    ///
    /// - [`ChipError::UpgradeWhileRented`] - a rental is open.
    /// - [`ChipError::VersionOutOfRange`] / [`ChipError::RevisionOutOfRange`] - bad input.
    /// - [`ChipError::NotAnUpgrade`] - requested firmware is not strictly newer.
    pub fn upgrade_firmware(&mut self, version: Decimal, revision: u8) -> Result<(), ChipError> {
        self.data.upgrade(version, revision)?;
        debug!(serial = %self.serial, firmware = %self.data.firmware, "firmware upgraded");
        Ok(())
    }

    /// Installs firmware `version.0`.
    pub fn upgrade_firmware_version(&mut self, version: Decimal) -> Result<(), ChipError> {
        self.upgrade_firmware(version, Firmware::MIN_REVISION)
    }

    /// Restores factory firmware and wipes telemetry. Serial and acquisition
    /// date are kept. An open rental is dropped without crediting its distance.
    pub fn reset(&mut self) {
        if self.data.reset() {
            self.fleet.rental_abandoned();
        }
        debug!(serial = %self.serial, "chip reset");
    }
}

fn timestamp_or_dash(timestamp: Option<NaiveDateTime>) -> String {
    timestamp.map_or_else(
        || "-".to_string(),
        |t| t.format(TIMESTAMP_FORMAT).to_string(),
    )
}

impl fmt::Display for BikeChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = Self::DECIMAL_PRECISION;
        write!(
            f,
            "{{ NS: {}; acquired: {}; fw: {}; rented: {}; {:.2} km total; \
             current rental: {}, {:.2} km; last rental: {} - {}, {:.2} km }}",
            self.serial,
            self.acquired_on,
            self.data.firmware,
            self.is_rented(),
            self.data.total_km.round_dp(precision),
            timestamp_or_dash(self.data.rented_since),
            self.data.trip_km.round_dp(precision),
            timestamp_or_dash(self.last_rental_start()),
            timestamp_or_dash(self.last_rental_end()),
            self.last_rental_km().round_dp(precision),
        )
    }
}

impl Serialize for BikeChip {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let precision = Self::DECIMAL_PRECISION;
        let mut state = serializer.serialize_struct("BikeChip", 8)?;
        state.serialize_field("serial", &self.serial)?;
        state.serialize_field("acquired", &self.acquired_on)?;
        state.serialize_field("firmware", &self.data.firmware.to_string())?;
        state.serialize_field("rented", &self.is_rented())?;
        state.serialize_field("total_km", &self.data.total_km.round_dp(precision))?;
        state.serialize_field("trip_km", &self.data.trip_km.round_dp(precision))?;
        state.serialize_field("rental_km", &self.data.rental_km.round_dp(precision))?;
        state.serialize_field("last_rental_km", &self.last_rental_km().round_dp(precision))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === ChipData Internal Tests ===
    // These test the private ChipData methods directly.

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn chip_data_rental_window() {
        let mut data = ChipData::new(Firmware::DEFAULT);
        data.rent(at(9)).unwrap();
        data.ride(dec!(20)).unwrap();
        let record = data.finish_rental(at(11)).unwrap();
        assert_eq!(
            record,
            RentalRecord {
                started_at: at(9),
                ended_at: at(11),
                distance_km: dec!(20),
            }
        );
        assert!(!data.is_rented());
        assert_eq!(data.trip_km, Decimal::ZERO);
        assert_eq!(data.rental_km, dec!(20));
        assert_eq!(data.total_km, dec!(20));
    }

    #[test]
    fn chip_data_double_rent_keeps_original_start() {
        let mut data = ChipData::new(Firmware::DEFAULT);
        data.rent(at(9)).unwrap();
        assert_eq!(data.rent(at(10)), Err(ChipError::AlreadyRented));
        assert_eq!(data.rented_since, Some(at(9)));
    }

    #[test]
    fn chip_data_rejected_trip_changes_nothing() {
        let mut data = ChipData::new(Firmware::DEFAULT);
        data.rent(at(9)).unwrap();
        data.ride(dec!(5)).unwrap();
        let before = data.clone();

        assert_eq!(data.ride(dec!(140.01)), Err(ChipError::InvalidDistance(dec!(140.01))));
        assert_eq!(data.ride(dec!(-0.5)), Err(ChipError::InvalidDistance(dec!(-0.5))));
        assert_eq!(data, before);
    }

    #[test]
    fn chip_data_zero_trip_accepted() {
        let mut data = ChipData::new(Firmware::DEFAULT);
        data.rent(at(9)).unwrap();
        assert_eq!(data.ride(Decimal::ZERO), Ok(Decimal::ZERO));
    }

    #[test]
    fn chip_data_upgrade_checks_state_before_arguments() {
        let mut data = ChipData::new(Firmware::DEFAULT);
        data.rent(at(9)).unwrap();
        assert_eq!(data.upgrade(dec!(99), 0), Err(ChipError::UpgradeWhileRented));
    }

    #[test]
    fn chip_data_upgrade_same_version_higher_revision() {
        let mut data = ChipData::new(Firmware::DEFAULT);
        data.upgrade(dec!(1.0), 1).unwrap();
        assert_eq!(data.firmware, Firmware::new(dec!(1.0), 1).unwrap());
    }

    #[test]
    fn chip_data_downgrade_rejected() {
        let mut data = ChipData::new(Firmware::new(dec!(3.0), 2).unwrap());
        let result = data.upgrade(dec!(2.9), 9);
        assert_eq!(
            result,
            Err(ChipError::NotAnUpgrade {
                current: Firmware::new(dec!(3.0), 2).unwrap(),
                requested: Firmware::new(dec!(2.9), 9).unwrap(),
            })
        );
    }

    #[test]
    fn chip_data_reset_reports_open_rental() {
        let mut data = ChipData::new(Firmware::new(dec!(4.0), 1).unwrap());
        data.rent(at(9)).unwrap();
        data.ride(dec!(7)).unwrap();
        assert!(data.reset());
        assert_eq!(data, ChipData::new(Firmware::DEFAULT));
        assert!(!data.reset());
    }

    #[test]
    fn rental_timestamps_are_utc() {
        let fleet = Fleet::new();
        let mut chip = BikeChip::with_defaults(&fleet).unwrap();
        let before = Utc::now().naive_utc();
        chip.rent().unwrap();
        let started = chip.current_rental_start().unwrap();
        assert!(started >= before);
        assert!(started - before < chrono::Duration::seconds(5));

        let record = chip.return_bike().unwrap();
        assert_eq!(record.started_at, started);
        assert!(record.ended_at >= record.started_at);
        assert!(record.ended_at <= Utc::now().naive_utc());
    }

    // === Display & Serialization Tests ===

    #[test]
    fn display_fresh_chip() {
        let fleet = Fleet::new();
        let date = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        let chip = BikeChip::new(&fleet, date, dec!(2.0), 3).unwrap();
        assert_eq!(
            chip.to_string(),
            "{ NS: 1; acquired: 2021-03-04; fw: 2.0.3; rented: false; 0.00 km total; \
             current rental: -, 0.00 km; last rental: - - -, 0.00 km }"
        );
    }

    #[test]
    fn serializer_rounds_to_two_decimal_places() {
        let fleet = Fleet::new();
        let date = NaiveDate::from_ymd_opt(2022, 8, 9).unwrap();
        let mut chip = BikeChip::new(&fleet, date, dec!(1.0), 0).unwrap();
        chip.rent().unwrap();
        chip.record_trip(dec!(10.456)).unwrap();

        let json = serde_json::to_string(&chip).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["serial"], 1);
        assert_eq!(parsed["acquired"], "2022-08-09");
        assert_eq!(parsed["firmware"], "1.0.0");
        assert_eq!(parsed["rented"], true);
        assert_eq!(parsed["total_km"].as_str().unwrap(), "10.46");
        assert_eq!(parsed["trip_km"].as_str().unwrap(), "10.46");
        assert_eq!(parsed["last_rental_km"].as_str().unwrap(), "0");
    }

    #[test]
    fn serializer_precision_constant_is_two() {
        assert_eq!(BikeChip::DECIMAL_PRECISION, 2);
    }
}
