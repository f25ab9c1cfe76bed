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

//! Error types for chip operations.

use crate::base::{Firmware, SerialNumber};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Broad classification of a [`ChipError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    InvalidArgument,
    /// The chip is in a state that forbids the operation.
    InvalidState,
}

/// Chip operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChipError {
    /// Acquisition date precedes the earliest accepted date
    #[error("acquisition date {0} is before {earliest}", earliest = crate::BikeChip::EARLIEST_ACQUISITION)]
    AcquisitionDateTooEarly(NaiveDate),

    /// Acquisition date lies in the future
    #[error("acquisition date {0} is in the future")]
    AcquisitionDateInFuture(NaiveDate),

    /// Firmware version outside the supported range
    #[error("firmware version out of range: {0}")]
    VersionOutOfRange(Decimal),

    /// Firmware revision outside the supported range
    #[error("firmware revision out of range: {0}")]
    RevisionOutOfRange(u8),

    /// Trip distance is negative or exceeds the single-trip maximum
    #[error("invalid trip distance: {0} km")]
    InvalidDistance(Decimal),

    /// Requested firmware is not newer than the installed one
    #[error("firmware {requested} is not an upgrade over {current}")]
    NotAnUpgrade {
        current: Firmware,
        requested: Firmware,
    },

    /// Factory asked for fewer than one chip
    #[error("invalid quantity: {0}")]
    InvalidQuantity(usize),

    /// No chip with this serial is known
    #[error("unknown chip: {0}")]
    UnknownChip(SerialNumber),

    /// Chip is already rented
    #[error("chip already rented")]
    AlreadyRented,

    /// Chip is not rented
    #[error("chip not rented")]
    NotRented,

    /// Firmware cannot change during a rental
    #[error("cannot upgrade firmware on a rented chip")]
    UpgradeWhileRented,
}

impl ChipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRented | Self::NotRented | Self::UpgradeWhileRented => {
                ErrorKind::InvalidState
            }
            _ => ErrorKind::InvalidArgument,
        }
    }
}
