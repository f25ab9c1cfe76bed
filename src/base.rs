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

//! Core identifier and firmware types.

use crate::ChipError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a chip within a [`Fleet`](crate::Fleet).
///
/// Serials are handed out by the fleet starting at 1 and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SerialNumber(pub u32);

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Firmware installed on a chip.
///
/// Ordering is lexicographic: version first, revision as the tiebreak. Field
/// order matters for the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Firmware {
    version: Decimal,
    revision: u8,
}

impl Firmware {
    pub const MIN_VERSION: Decimal = dec!(1.0);
    pub const MAX_VERSION: Decimal = dec!(10.9);
    pub const MIN_REVISION: u8 = 0;
    pub const MAX_REVISION: u8 = 9;

    /// Versions carry at most one decimal place.
    const VERSION_SCALE: u32 = 1;

    /// Firmware a chip ships with, and returns to on reset.
    pub const DEFAULT: Firmware = Firmware {
        version: Self::MIN_VERSION,
        revision: Self::MIN_REVISION,
    };

    /// Validates both components.
    ///
    /// # Errors
    ///
    /// - [`ChipError::VersionOutOfRange`] if `version` is outside `[1.0, 10.9]`
    ///   or carries more than one decimal place.
    /// - [`ChipError::RevisionOutOfRange`] if `revision` is outside `[0, 9]`.
    pub fn new(version: Decimal, revision: u8) -> Result<Self, ChipError> {
        if version < Self::MIN_VERSION
            || version > Self::MAX_VERSION
            || version.normalize().scale() > Self::VERSION_SCALE
        {
            return Err(ChipError::VersionOutOfRange(version));
        }
        if !(Self::MIN_REVISION..=Self::MAX_REVISION).contains(&revision) {
            return Err(ChipError::RevisionOutOfRange(revision));
        }
        let mut version = version.normalize();
        version.rescale(Self::VERSION_SCALE);
        Ok(Self { version, revision })
    }

    pub fn version(&self) -> Decimal {
        self.version
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }
}

impl Default for Firmware {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Renders as `version.revision`, e.g. `2.0.3`.
impl fmt::Display for Firmware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.version, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_bounds_are_inclusive() {
        assert!(Firmware::new(dec!(1.0), 0).is_ok());
        assert!(Firmware::new(dec!(10.9), 9).is_ok());
        assert_eq!(
            Firmware::new(dec!(0.5), 0),
            Err(ChipError::VersionOutOfRange(dec!(0.5)))
        );
        assert_eq!(
            Firmware::new(dec!(11.0), 0),
            Err(ChipError::VersionOutOfRange(dec!(11.0)))
        );
    }

    #[test]
    fn version_with_two_decimal_places_rejected() {
        assert_eq!(
            Firmware::new(dec!(1.05), 0),
            Err(ChipError::VersionOutOfRange(dec!(1.05)))
        );
        // Trailing zeros are not extra precision
        assert_eq!(Firmware::new(dec!(2.50), 1).unwrap().to_string(), "2.5.1");
    }

    #[test]
    fn revision_above_nine_rejected() {
        assert_eq!(
            Firmware::new(dec!(2.0), 10),
            Err(ChipError::RevisionOutOfRange(10))
        );
    }

    #[test]
    fn ordering_is_version_then_revision() {
        let v1_9 = Firmware::new(dec!(1.0), 9).unwrap();
        let v2_0 = Firmware::new(dec!(2.0), 0).unwrap();
        let v2_1 = Firmware::new(dec!(2.0), 1).unwrap();
        assert!(v1_9 < v2_0);
        assert!(v2_0 < v2_1);
        assert_eq!(Firmware::new(dec!(2.00), 1).unwrap(), v2_1);
    }

    #[test]
    fn display_formats_version_dot_revision() {
        assert_eq!(Firmware::DEFAULT.to_string(), "1.0.0");
        assert_eq!(Firmware::new(dec!(3.5), 4).unwrap().to_string(), "3.5.4");
        assert_eq!(Firmware::new(dec!(2), 0).unwrap().to_string(), "2.0.0");
        assert_eq!(Firmware::new(dec!(10.90), 9).unwrap().to_string(), "10.9.9");
        assert_eq!(SerialNumber(42).to_string(), "42");
    }
}
