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

//! # Rental Ledger
//!
//! This library provides the booking and treasury core of a multi-tenant
//! vacation-rental manager: availability checks over half-open date ranges,
//! channel commission derivation, and reconciliation of bookings against an
//! independently-recorded stream of payment movements.
//!
//! ## Core Components
//!
//! - [`Engine`]: orchestrator over the tenant-scoped store tables
//! - [`availability`]: date-range math and conflict detection
//! - [`commission`]: channel rates to amount breakdowns
//! - [`ledger`]: movement sums and paid/pending derivation
//! - [`EngineError`]: the failure taxonomy shared by all operations
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rental_ledger_rs::{Engine, NewBooking, TenantContext, TenantId, PersonId};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let ctx = TenantContext::new(TenantId(1));
//! let catalog = engine.seed_default_catalog(ctx);
//! let property = engine.add_property(ctx, "Casa Azul");
//!
//! let booking = engine
//!     .create_booking(ctx, NewBooking {
//!         property_id: property.id,
//!         person_id: Some(PersonId(1)),
//!         channel_id: None,
//!         check_in_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
//!         check_out_date: NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(),
//!         guests: 2,
//!         total_amount: dec!(1000),
//!         status_id: catalog.confirmed,
//!         type_id: catalog.standard,
//!     })
//!     .unwrap();
//! assert_eq!(booking.net_amount, dec!(1000));
//! ```
//!
//! ## Thread Safety
//!
//! The engine's tables handle concurrent access across requests; booking
//! writes serialize on an internal lock so the availability check and the
//! write it guards cannot interleave with a racing writer.

pub mod availability;
pub mod base;
pub mod booking;
pub mod catalog;
pub mod commission;
mod engine;
pub mod error;
pub mod http;
pub mod ledger;
pub mod movement;

pub use availability::{Availability, DateRange};
pub use base::{
    BookingId, ChannelId, ConfigValueId, ExpenseItemId, MovementId, PersonId, PropertyId,
    ServiceProviderId, TenantContext, TenantId,
};
pub use booking::{AmountOverrides, Booking, BookingPatch, NewBooking, Property};
pub use catalog::{
    BookingStatusKind, BookingTypeKind, ConfigCategory, ConfigValue, MovementKind,
    MovementStatusKind, NewConfigValue,
};
pub use commission::{AmountBreakdown, ChannelRates, NewChannel, SalesChannel};
pub use engine::{BookingPolicy, CatalogDefaults, Engine};
pub use error::{EngineError, ErrorKind};
pub use ledger::BookingFinancials;
pub use movement::{
    ExpenseItem, ExpenseItemPatch, Movement, MovementPatch, NewExpenseItem, NewMovement,
};
