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

//! Ledger reconciliation: derived totals over the movement stream.
//!
//! Both recomputations here are whole-set sums re-run on demand instead of
//! incrementally maintained deltas, so re-invoking them after a partial
//! failure converges to the same figures. The engine wires them to the store;
//! this module is pure.

use crate::base::BookingId;
use crate::booking::Booking;
use crate::movement::{ExpenseItem, Movement};
use rust_decimal::Decimal;
use serde::Serialize;

/// Paid and pending figures of one booking, derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookingFinancials {
    pub paid_amount: Decimal,
    /// May be negative: that is an overpayment and is surfaced as-is.
    pub pending_amount: Decimal,
}

/// Sum of line-item totals, `None` when the movement has no items (its own
/// amount then stays authoritative).
pub fn items_total<'a>(items: impl Iterator<Item = &'a ExpenseItem>) -> Option<Decimal> {
    let mut any = false;
    let mut sum = Decimal::ZERO;
    for item in items {
        any = true;
        sum += item.total_amount;
    }
    any.then_some(sum)
}

/// Sum of settled income movements linked to the booking.
pub fn paid_amount<'a>(
    movements: impl Iterator<Item = &'a Movement>,
    booking_id: BookingId,
) -> Decimal {
    movements
        .filter(|m| m.pays_booking(booking_id))
        .map(|m| m.amount)
        .sum()
}

/// Derives the paid/pending pair for a booking.
///
/// `pending = basis - paid` where the basis is the net amount for channel
/// bookings and the gross total for direct ones. An overpaid booking yields a
/// negative pending amount, reported through a warning event but never
/// hidden.
pub fn financials(booking: &Booking, paid: Decimal) -> BookingFinancials {
    let pending = booking.payment_basis() - paid;
    if pending < Decimal::ZERO {
        tracing::warn!(
            booking = %booking.id,
            %paid,
            basis = %booking.payment_basis(),
            "booking is overpaid"
        );
    }
    BookingFinancials {
        paid_amount: paid,
        pending_amount: pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ConfigValueId, ExpenseItemId, MovementId, TenantId};
    use crate::catalog::{MovementKind, MovementStatusKind};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn item(id: u64, total: Decimal) -> ExpenseItem {
        ExpenseItem {
            id: ExpenseItemId(id),
            movement_id: MovementId(1),
            tenant_id: TenantId(1),
            service_provider_service_id: None,
            service_name: "service".to_string(),
            amount: total,
            tax_type_id: None,
            tax_amount: Decimal::ZERO,
            total_amount: total,
            notes: None,
        }
    }

    fn income(id: u64, booking: u64, amount: Decimal, status: MovementStatusKind) -> Movement {
        Movement {
            id: MovementId(id),
            tenant_id: TenantId(1),
            type_id: ConfigValueId(1),
            type_kind: MovementKind::Income,
            status_id: ConfigValueId(2),
            status_kind: status,
            amount,
            movement_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            booking_id: Some(BookingId(booking)),
            service_provider_id: None,
            notes: None,
        }
    }

    #[test]
    fn items_total_sums_line_items() {
        let items = [item(1, dec!(45.50)), item(2, dec!(12.25))];
        assert_eq!(items_total(items.iter()), Some(dec!(57.75)));
    }

    #[test]
    fn items_total_is_none_without_items() {
        assert_eq!(items_total([].iter()), None);
    }

    #[test]
    fn paid_amount_sums_settled_income_only() {
        let movements = [
            income(1, 7, dec!(300), MovementStatusKind::Completed),
            income(2, 7, dec!(310), MovementStatusKind::Completed),
            income(3, 7, dec!(50), MovementStatusKind::Pending),
            income(4, 8, dec!(1000), MovementStatusKind::Completed),
        ];
        assert_eq!(paid_amount(movements.iter(), BookingId(7)), dec!(610));
        assert_eq!(paid_amount(movements.iter(), BookingId(9)), Decimal::ZERO);
    }
}
