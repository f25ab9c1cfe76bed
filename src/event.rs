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

//! Chip events.
//!
//! Events address an existing chip by serial and map one-to-one onto the
//! [`BikeChip`](crate::BikeChip) operations.

use crate::base::SerialNumber;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChipEvent {
    Rent {
        serial: SerialNumber,
    },
    /// A trip; `None` rides the maximum single-trip distance.
    Ride {
        serial: SerialNumber,
        distance_km: Option<Decimal>,
    },
    Return {
        serial: SerialNumber,
    },
    /// A firmware upgrade; a missing revision means revision 0.
    Upgrade {
        serial: SerialNumber,
        version: Decimal,
        revision: Option<u8>,
    },
    Reset {
        serial: SerialNumber,
    },
}

impl ChipEvent {
    pub fn serial(&self) -> SerialNumber {
        match self {
            Self::Rent { serial } => *serial,
            Self::Ride { serial, .. } => *serial,
            Self::Return { serial } => *serial,
            Self::Upgrade { serial, .. } => *serial,
            Self::Reset { serial } => *serial,
        }
    }

    /// Short lowercase name, as used in replay files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rent { .. } => "rent",
            Self::Ride { .. } => "ride",
            Self::Return { .. } => "return",
            Self::Upgrade { .. } => "upgrade",
            Self::Reset { .. } => "reset",
        }
    }
}
