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

//! Financial movements and expense line items.
//!
//! A movement is a single financial event, income or expense, optionally
//! linked to a booking (income) or a service provider (expense). An expense
//! movement may be itemized; once it has line items its `amount` is the sum
//! of the items' totals and is rewritten by the reconciler after every item
//! write.

use crate::base::{
    BookingId, ConfigValueId, ExpenseItemId, MovementId, ServiceProviderId, TenantId,
};
use crate::catalog::{MovementKind, MovementStatusKind};
use crate::commission::round_money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A financial event recorded against the tenant's treasury.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub type_id: ConfigValueId,
    pub type_kind: MovementKind,
    pub status_id: ConfigValueId,
    pub status_kind: MovementStatusKind,
    /// Authoritative for non-itemized movements; derived from items otherwise.
    pub amount: Decimal,
    pub movement_date: NaiveDate,
    pub booking_id: Option<BookingId>,
    pub service_provider_id: Option<ServiceProviderId>,
    pub notes: Option<String>,
}

impl Movement {
    /// Whether this movement contributes to a booking's paid amount.
    pub fn pays_booking(&self, booking_id: BookingId) -> bool {
        self.booking_id == Some(booking_id)
            && self.type_kind.is_income()
            && self.status_kind.is_settled()
    }
}

/// A line item of an itemized expense movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub id: ExpenseItemId,
    pub movement_id: MovementId,
    pub tenant_id: TenantId,
    pub service_provider_service_id: Option<u64>,
    pub service_name: String,
    pub amount: Decimal,
    pub tax_type_id: Option<ConfigValueId>,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
}

/// Input for creating a movement.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovement {
    pub type_id: ConfigValueId,
    pub status_id: ConfigValueId,
    pub amount: Decimal,
    pub movement_date: NaiveDate,
    pub booking_id: Option<BookingId>,
    pub service_provider_id: Option<ServiceProviderId>,
    pub notes: Option<String>,
}

/// Partial update of a movement. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementPatch {
    pub status_id: Option<ConfigValueId>,
    pub amount: Option<Decimal>,
    pub movement_date: Option<NaiveDate>,
    pub booking_id: Option<Option<BookingId>>,
    pub notes: Option<String>,
}

/// Input for creating an expense line item.
///
/// `tax_amount` and `total_amount` may be omitted: tax is then derived from
/// the tax type's rate and the total defaults to `amount + tax_amount`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExpenseItem {
    pub service_provider_service_id: Option<u64>,
    pub service_name: String,
    pub amount: Decimal,
    pub tax_type_id: Option<ConfigValueId>,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub notes: Option<String>,
}

impl NewExpenseItem {
    /// Fills in missing tax and total figures. `tax_rate` is the resolved
    /// percentage of the item's tax type (zero when there is none).
    pub fn resolve_amounts(&self, tax_rate: Decimal) -> (Decimal, Decimal) {
        let tax_amount = self
            .tax_amount
            .unwrap_or_else(|| round_money(self.amount * tax_rate / dec!(100)));
        let total_amount = self.total_amount.unwrap_or(self.amount + tax_amount);
        (tax_amount, total_amount)
    }
}

/// Partial update of an expense line item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseItemPatch {
    pub service_name: Option<String>,
    pub amount: Option<Decimal>,
    pub tax_type_id: Option<ConfigValueId>,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub notes: Option<String>,
}
