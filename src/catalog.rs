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

//! Configuration catalog: tenant-scoped enumeration rows.
//!
//! Statuses, booking types, movement types and tax types are operator-editable
//! rows rather than fixed enums. The core parses each row's `value` code into
//! a semantic kind once, at the point the row is attached to a record, so the
//! structural rules (cancelled frees the calendar, closed periods are exempt
//! from occupancy conflicts, only settled income counts as paid) are matches
//! on typed variants instead of string comparisons. Operator-added codes the
//! core does not recognize pass through as `Other`.

use crate::base::{ConfigValueId, TenantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Semantic family a catalog row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCategory {
    BookingStatus,
    BookingType,
    MovementType,
    MovementStatus,
    TaxType,
}

/// One row of the configuration catalog.
///
/// Tax types carry their percentage in `description` as operator-edited free
/// text; see [`ConfigValue::tax_rate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub id: ConfigValueId,
    pub tenant_id: TenantId,
    pub category: ConfigCategory,
    pub value: String,
    pub label: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i32,
}

/// Input for creating a catalog row.
#[derive(Debug, Clone)]
pub struct NewConfigValue {
    pub category: ConfigCategory,
    pub value: String,
    pub label: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i32,
}

impl NewConfigValue {
    pub fn new(category: ConfigCategory, value: &str, label: &str) -> Self {
        Self {
            category,
            value: value.to_string(),
            label: label.to_string(),
            description: None,
            color: None,
            icon: None,
            sort_order: 0,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

impl ConfigValue {
    /// Percentage rate of a tax type, parsed from its description.
    ///
    /// The description is operator-editable free text, so a value that does
    /// not parse yields zero with a warning instead of an error. Accepts an
    /// optional trailing `%`.
    pub fn tax_rate(&self) -> Decimal {
        let raw = self.description.as_deref().unwrap_or("").trim();
        let raw = raw.strip_suffix('%').map_or(raw, str::trim_end);
        if raw.is_empty() {
            return Decimal::ZERO;
        }
        match raw.parse::<Decimal>() {
            Ok(rate) => rate,
            Err(_) => {
                tracing::warn!(
                    config_value = %self.id,
                    description = %self.description.as_deref().unwrap_or(""),
                    "tax type description is not numeric, using 0"
                );
                Decimal::ZERO
            }
        }
    }
}

/// Booking status semantics.
///
/// The label set is tenant-configurable; the core only relies on the
/// cancelled/active split. Known codes parse into named variants so the
/// transition rules read as matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatusKind {
    Draft,
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Other(String),
}

impl BookingStatusKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "draft" => Self::Draft,
            "pending" => Self::Pending,
            "confirmed" => Self::Confirmed,
            "checked_in" => Self::CheckedIn,
            "checked_out" => Self::CheckedOut,
            "cancelled" | "canceled" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Any non-cancelled status occupies the calendar.
    pub fn is_active(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Booking type semantics: commercial stay or calendar block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingTypeKind {
    Standard,
    ClosedPeriod,
    Other(String),
}

impl BookingTypeKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "standard" | "booking" => Self::Standard,
            "closed_period" | "closed" => Self::ClosedPeriod,
            other => Self::Other(other.to_string()),
        }
    }

    /// Closed periods block the calendar for display but do not count as
    /// guest-occupancy conflicts.
    pub fn is_occupancy_exempt(&self) -> bool {
        matches!(self, Self::ClosedPeriod)
    }

    /// Whether a booking of this type represents a guest stay.
    pub fn carries_guest(&self) -> bool {
        !matches!(self, Self::ClosedPeriod)
    }
}

/// Movement direction. The original catalog carries Spanish codes alongside
/// the English ones, so both are recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Income,
    Expense,
    Other(String),
}

impl MovementKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "income" | "ingreso" => Self::Income,
            "expense" | "gasto" => Self::Expense,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_income(&self) -> bool {
        matches!(self, Self::Income)
    }
}

/// Movement status semantics. Only settled movements count towards a
/// booking's paid amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatusKind {
    Completed,
    Pending,
    Failed,
    Cancelled,
    Other(String),
}

impl MovementStatusKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "completed" | "paid" | "pagado" => Self::Completed,
            "pending" | "pendiente" => Self::Pending,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    /// A movement counts as paid unless it is explicitly pending, failed or
    /// cancelled. Unknown operator-added statuses are treated as settled,
    /// matching how the reporting screens total them.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ConfigValueId, TenantId};
    use rust_decimal_macros::dec;

    fn tax_type(description: Option<&str>) -> ConfigValue {
        ConfigValue {
            id: ConfigValueId(1),
            tenant_id: TenantId(1),
            category: ConfigCategory::TaxType,
            value: "vat".to_string(),
            label: "VAT".to_string(),
            description: description.map(str::to_string),
            color: None,
            icon: None,
            sort_order: 0,
        }
    }

    #[test]
    fn tax_rate_parses_numeric_description() {
        assert_eq!(tax_type(Some("21")).tax_rate(), dec!(21));
        assert_eq!(tax_type(Some("10.5")).tax_rate(), dec!(10.5));
        assert_eq!(tax_type(Some(" 7 ")).tax_rate(), dec!(7));
        assert_eq!(tax_type(Some("21%")).tax_rate(), dec!(21));
    }

    #[test]
    fn tax_rate_falls_back_to_zero() {
        assert_eq!(tax_type(None).tax_rate(), Decimal::ZERO);
        assert_eq!(tax_type(Some("")).tax_rate(), Decimal::ZERO);
        assert_eq!(tax_type(Some("exempt")).tax_rate(), Decimal::ZERO);
        assert_eq!(tax_type(Some("21 percent")).tax_rate(), Decimal::ZERO);
    }

    #[test]
    fn booking_status_parsing() {
        assert_eq!(
            BookingStatusKind::parse("confirmed"),
            BookingStatusKind::Confirmed
        );
        assert_eq!(
            BookingStatusKind::parse("Cancelled"),
            BookingStatusKind::Cancelled
        );
        assert_eq!(
            BookingStatusKind::parse("canceled"),
            BookingStatusKind::Cancelled
        );
        assert_eq!(
            BookingStatusKind::parse("on_hold"),
            BookingStatusKind::Other("on_hold".to_string())
        );
    }

    #[test]
    fn unknown_statuses_are_active() {
        assert!(BookingStatusKind::parse("on_hold").is_active());
        assert!(BookingStatusKind::parse("confirmed").is_active());
        assert!(!BookingStatusKind::parse("cancelled").is_active());
    }

    #[test]
    fn booking_type_parsing() {
        assert!(BookingTypeKind::parse("closed_period").is_occupancy_exempt());
        assert!(BookingTypeKind::parse("closed").is_occupancy_exempt());
        assert!(!BookingTypeKind::parse("standard").is_occupancy_exempt());
        assert!(!BookingTypeKind::parse("owner_stay").is_occupancy_exempt());
        assert!(!BookingTypeKind::parse("closed_period").carries_guest());
        assert!(BookingTypeKind::parse("standard").carries_guest());
    }

    #[test]
    fn movement_kind_parsing_accepts_spanish_codes() {
        assert_eq!(MovementKind::parse("income"), MovementKind::Income);
        assert_eq!(MovementKind::parse("ingreso"), MovementKind::Income);
        assert_eq!(MovementKind::parse("expense"), MovementKind::Expense);
        assert_eq!(MovementKind::parse("gasto"), MovementKind::Expense);
        assert_eq!(
            MovementKind::parse("transfer"),
            MovementKind::Other("transfer".to_string())
        );
    }

    #[test]
    fn settled_statuses() {
        assert!(MovementStatusKind::parse("completed").is_settled());
        assert!(MovementStatusKind::parse("paid").is_settled());
        assert!(!MovementStatusKind::parse("pending").is_settled());
        assert!(!MovementStatusKind::parse("failed").is_settled());
        assert!(!MovementStatusKind::parse("cancelled").is_settled());
        // Operator-added codes default to settled.
        assert!(MovementStatusKind::parse("reconciled").is_settled());
    }
}
