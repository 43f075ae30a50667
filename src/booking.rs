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

//! Booking records and their amount bookkeeping.
//!
//! A booking reserves one property for a half-open date interval. Its
//! deduction fields (sales commission, collection commission, tax) start as
//! derived values but may be overridden by the operator; `net_amount` is
//! always derived and recomputed on every amount write. Paid and pending
//! amounts never live here; they are computed from the movement stream at
//! read time.

use crate::base::{BookingId, ChannelId, ConfigValueId, PersonId, PropertyId, TenantId};
use crate::availability::DateRange;
use crate::catalog::{BookingStatusKind, BookingTypeKind};
use crate::commission::AmountBreakdown;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A rental property. The core only needs existence and tenancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub tenant_id: TenantId,
    pub name: String,
}

/// Which deduction fields the operator has pinned by hand.
///
/// A pinned field survives recalculation triggered by unrelated edits; only
/// an explicit write to the field itself moves it again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountOverrides {
    pub sales_commission: bool,
    pub collection_commission: bool,
    pub tax: bool,
}

/// A reservation of one property over `[check_in, check_out)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    /// `None` only for closed periods.
    pub person_id: Option<PersonId>,
    pub channel_id: Option<ChannelId>,
    pub range: DateRange,
    pub guests: u32,
    pub total_amount: Decimal,
    pub sales_commission_amount: Decimal,
    pub collection_commission_amount: Decimal,
    pub tax_amount: Decimal,
    /// Derived; never independently editable.
    pub net_amount: Decimal,
    pub status_id: ConfigValueId,
    pub status_kind: BookingStatusKind,
    pub type_id: ConfigValueId,
    pub type_kind: BookingTypeKind,
    pub overrides: AmountOverrides,
}

impl Booking {
    /// `net = total - sales - collection - tax`. Called after every write
    /// that touches an amount field.
    pub fn recompute_net(&mut self) {
        self.net_amount = self.total_amount
            - self.sales_commission_amount
            - self.collection_commission_amount
            - self.tax_amount;
    }

    /// Applies a freshly computed breakdown, skipping operator-pinned fields.
    pub fn apply_breakdown(&mut self, breakdown: &AmountBreakdown) {
        if !self.overrides.sales_commission {
            self.sales_commission_amount = breakdown.sales_commission;
        }
        if !self.overrides.collection_commission {
            self.collection_commission_amount = breakdown.collection_commission;
        }
        if !self.overrides.tax {
            self.tax_amount = breakdown.tax;
        }
        self.recompute_net();
    }

    pub fn is_active(&self) -> bool {
        self.status_kind.is_active()
    }

    /// Whether this booking counts for guest-occupancy conflicts. Closed
    /// periods block the calendar display but are exempt here.
    pub fn occupies_calendar(&self) -> bool {
        self.is_active() && !self.type_kind.is_occupancy_exempt()
    }

    /// Base the pending amount is measured against: net when the booking came
    /// through a channel, gross otherwise.
    pub fn payment_basis(&self) -> Decimal {
        if self.channel_id.is_some() {
            self.net_amount
        } else {
            self.total_amount
        }
    }
}

/// Input for creating a booking.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub property_id: PropertyId,
    pub person_id: Option<PersonId>,
    pub channel_id: Option<ChannelId>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub guests: u32,
    pub total_amount: Decimal,
    pub status_id: ConfigValueId,
    pub type_id: ConfigValueId,
}

/// Partial update of a booking. Absent fields are left untouched.
///
/// Writing a deduction field pins it as an operator override; double options
/// distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct BookingPatch {
    pub property_id: Option<PropertyId>,
    pub person_id: Option<Option<PersonId>>,
    pub channel_id: Option<Option<ChannelId>>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub guests: Option<u32>,
    pub total_amount: Option<Decimal>,
    pub sales_commission_amount: Option<Decimal>,
    pub collection_commission_amount: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
}

impl BookingPatch {
    /// Whether the patch moves the booking on the calendar.
    pub fn touches_schedule(&self) -> bool {
        self.property_id.is_some() || self.check_in_date.is_some() || self.check_out_date.is_some()
    }

    /// Whether the patch requires rerunning the commission calculator.
    pub fn touches_pricing(&self) -> bool {
        self.total_amount.is_some() || self.channel_id.is_some()
    }
}
