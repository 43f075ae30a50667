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

//! Error types for booking and ledger operations.

use crate::base::BookingId;
use thiserror::Error;

/// Broad failure class, used by the transport layer for status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or semantically invalid input. Rejected before store access.
    Validation,
    /// Entity absent or outside the caller's tenant. Indistinguishable on purpose.
    NotFound,
    /// The request collides with existing state (overlap, last line item).
    Conflict,
    /// The store produced an unexpected shape or the tenant is misconfigured.
    Dependency,
}

/// Booking and ledger processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Check-out must be strictly after check-in
    #[error("check-out date must be after check-in date")]
    InvalidDateRange,

    /// Check-in is before the configured cutoff
    #[error("check-in date is earlier than allowed")]
    CheckInTooEarly,

    /// Guest-carrying bookings need at least one guest
    #[error("guest count must be at least 1")]
    InvalidGuestCount,

    /// Guest-carrying bookings need a guest record
    #[error("a guest is required for this booking type")]
    MissingGuest,

    /// Booking totals cannot be negative
    #[error("amount must not be negative")]
    NegativeAmount,

    /// Movement line items require a positive amount
    #[error("amount must be positive")]
    NonPositiveAmount,

    /// Expense line items require a service name
    #[error("service name must not be empty")]
    EmptyServiceName,

    /// A catalog id was passed for the wrong category
    #[error("configuration value has the wrong category")]
    WrongConfigCategory,

    /// Entity absent or owned by another tenant
    #[error("not found")]
    NotFound,

    /// The candidate date range overlaps active bookings
    #[error("dates conflict with {} existing booking(s)", conflicting.len())]
    BookingOverlap { conflicting: Vec<BookingId> },

    /// An itemized expense must keep at least one line item
    #[error("an itemized expense must retain at least one line item")]
    LastExpenseItem,

    /// The tenant catalog is missing a value the operation needs
    #[error("tenant configuration is incomplete: {0}")]
    MissingCatalogValue(&'static str),
}

impl EngineError {
    /// Classifies the error for transport-level status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDateRange
            | Self::CheckInTooEarly
            | Self::InvalidGuestCount
            | Self::MissingGuest
            | Self::NegativeAmount
            | Self::NonPositiveAmount
            | Self::EmptyServiceName
            | Self::WrongConfigCategory => ErrorKind::Validation,
            Self::NotFound => ErrorKind::NotFound,
            Self::BookingOverlap { .. } | Self::LastExpenseItem => ErrorKind::Conflict,
            Self::MissingCatalogValue(_) => ErrorKind::Dependency,
        }
    }
}
