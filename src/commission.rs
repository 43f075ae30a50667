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

//! Channel commission and tax derivation.
//!
//! Pure money math: given a gross amount and a channel's rates, derive the
//! sales commission, collection commission, tax and net amounts. Each derived
//! figure is rounded half-up to 2 decimal places at computation time, so
//! `net == total - sales - collection - tax` holds exactly on the stored
//! values, not only at display time.

use crate::base::{ChannelId, ConfigValueId, TenantId};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Monetary figures are kept at cent precision.
pub const MONEY_DP: u32 = 2;

/// Rounds a monetary figure half-up (away from zero on the midpoint).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// An external booking source with its commission and tax terms.
///
/// Rates are copied into a booking's amount fields when the booking is
/// created; editing a channel afterwards does not rewrite existing bookings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesChannel {
    pub id: ChannelId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Percentage, e.g. `15` for 15%.
    pub sales_commission: Decimal,
    /// Percentage charged for collecting the payment.
    pub collection_commission: Decimal,
    pub apply_tax: bool,
    pub tax_type_id: Option<ConfigValueId>,
}

/// Input for registering a sales channel.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChannel {
    pub name: String,
    pub sales_commission: Decimal,
    pub collection_commission: Decimal,
    pub apply_tax: bool,
    pub tax_type_id: Option<ConfigValueId>,
}

/// Channel terms resolved against the tenant catalog, ready for computation.
///
/// `tax_pct` is zero when the channel does not apply tax or its tax type has
/// no usable rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRates {
    pub sales_pct: Decimal,
    pub collection_pct: Decimal,
    pub tax_pct: Decimal,
}

/// Deduction and net figures derived from a gross amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountBreakdown {
    pub sales_commission: Decimal,
    pub collection_commission: Decimal,
    pub tax: Decimal,
    pub net: Decimal,
}

impl AmountBreakdown {
    /// Breakdown for a direct booking: no deductions, net equals gross.
    pub fn direct(total: Decimal) -> Self {
        Self {
            sales_commission: Decimal::ZERO,
            collection_commission: Decimal::ZERO,
            tax: Decimal::ZERO,
            net: total,
        }
    }
}

/// Derives commission, tax and net amounts from a gross total.
///
/// Without rates every deduction is zero and `net == total`. A negative net
/// signals a misconfigured channel (rates summing past 100%); it is reported
/// through a warning event and returned as computed, never clamped.
pub fn compute_amounts(total: Decimal, rates: Option<&ChannelRates>) -> AmountBreakdown {
    let Some(rates) = rates else {
        return AmountBreakdown::direct(total);
    };

    let hundred = dec!(100);
    let sales_commission = round_money(total * rates.sales_pct / hundred);
    let collection_commission = round_money(total * rates.collection_pct / hundred);
    let tax = round_money(total * rates.tax_pct / hundred);
    let net = total - sales_commission - collection_commission - tax;

    if net < Decimal::ZERO {
        tracing::warn!(
            %total,
            %sales_commission,
            %collection_commission,
            %tax,
            %net,
            "channel rates drove the net amount negative"
        );
    }

    AmountBreakdown {
        sales_commission,
        collection_commission,
        tax,
        net,
    }
}
