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

//! Date-range math and booking conflict detection.
//!
//! Booking intervals are half-open `[check_in, check_out)`: a guest checking
//! out on day X never conflicts with a guest checking in on day X. All
//! functions here are pure projections over booking slices; the engine owns
//! the store access around them.

use crate::base::BookingId;
use crate::booking::Booking;
use crate::error::EngineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Half-open calendar interval `[check_in, check_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl DateRange {
    /// Builds a range, rejecting empty or inverted intervals.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, EngineError> {
        if check_out <= check_in {
            return Err(EngineError::InvalidDateRange);
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Standard hotel-style overlap: `[a, b)` and `[c, d)` overlap iff
    /// `a < d && c < b`.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Calendar days covered by the range, check-out day excluded.
    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let check_out = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < check_out)
    }

    /// Intersection with a window, `None` when disjoint.
    pub fn clip(&self, window: &DateRange) -> Option<DateRange> {
        let check_in = self.check_in.max(window.check_in);
        let check_out = self.check_out.min(window.check_out);
        (check_in < check_out).then_some(DateRange {
            check_in,
            check_out,
        })
    }
}

/// Outcome of an availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub conflicting: Vec<BookingId>,
}

impl Availability {
    fn from_conflicts(conflicting: Vec<BookingId>) -> Self {
        Self {
            available: conflicting.is_empty(),
            conflicting,
        }
    }
}

/// Checks a candidate range against existing bookings of one property.
///
/// Cancelled bookings and occupancy-exempt types (closed periods) never
/// conflict; `exclude` skips the booking being edited so a date change only
/// validates against *other* bookings.
pub fn check<'a>(
    bookings: impl Iterator<Item = &'a Booking>,
    candidate: &DateRange,
    exclude: Option<BookingId>,
) -> Availability {
    let mut conflicting: Vec<BookingId> = bookings
        .filter(|b| Some(b.id) != exclude)
        .filter(|b| b.occupies_calendar())
        .filter(|b| b.range.overlaps(candidate))
        .map(|b| b.id)
        .collect();
    conflicting.sort();
    Availability::from_conflicts(conflicting)
}

/// Expands every active booking (closed periods included) into its calendar
/// days inside `window`, for rendering an availability calendar.
///
/// Returns sorted, deduplicated days.
pub fn blocked_days<'a>(
    bookings: impl Iterator<Item = &'a Booking>,
    window: &DateRange,
) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = bookings
        .filter(|b| b.is_active())
        .filter_map(|b| b.range.clip(window))
        .flat_map(DateRange::days)
        .collect();
    days.sort();
    days.dedup();
    days
}
