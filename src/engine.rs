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

//! Booking and treasury engine.
//!
//! The [`Engine`] owns the store tables and orchestrates the two halves of
//! the core: the booking lifecycle (availability check, commission
//! derivation, status transitions) and ledger reconciliation (movement totals
//! from line items, paid/pending figures from the movement stream).
//!
//! # Tenancy
//!
//! Every operation takes a [`TenantContext`]; a record owned by another
//! tenant is reported as [`EngineError::NotFound`], indistinguishable from a
//! missing record, so existence never leaks across tenants.
//!
//! # Concurrency
//!
//! Tables are [`DashMap`]s, safe for concurrent access across requests.
//! Booking writes additionally serialize on one mutex so the availability
//! check and the insert it guards are atomic; without it two racing writers
//! could both pass the check and double-book a property.

use crate::availability::{self, Availability, DateRange};
use crate::base::{
    BookingId, ChannelId, ConfigValueId, ExpenseItemId, MovementId, PropertyId, TenantContext,
};
use crate::booking::{AmountOverrides, Booking, BookingPatch, NewBooking, Property};
use crate::catalog::{
    BookingStatusKind, BookingTypeKind, ConfigCategory, ConfigValue, MovementKind,
    MovementStatusKind, NewConfigValue,
};
use crate::commission::{self, ChannelRates, NewChannel, SalesChannel};
use crate::error::EngineError;
use crate::ledger::{self, BookingFinancials};
use crate::movement::{
    ExpenseItem, ExpenseItemPatch, Movement, MovementPatch, NewExpenseItem, NewMovement,
};
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operator-configurable booking rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingPolicy {
    /// Earliest allowed check-in date; `None` permits historical backfill.
    pub min_check_in: Option<NaiveDate>,
}

/// Catalog ids created by [`Engine::seed_default_catalog`].
#[derive(Debug, Clone, Copy)]
pub struct CatalogDefaults {
    pub confirmed: ConfigValueId,
    pub cancelled: ConfigValueId,
    pub standard: ConfigValueId,
    pub closed_period: ConfigValueId,
    pub income: ConfigValueId,
    pub expense: ConfigValueId,
    pub completed: ConfigValueId,
    pub pending_payment: ConfigValueId,
    pub failed: ConfigValueId,
}

/// Booking and treasury engine over tenant-scoped store tables.
pub struct Engine {
    properties: DashMap<PropertyId, Property>,
    channels: DashMap<ChannelId, SalesChannel>,
    config_values: DashMap<ConfigValueId, ConfigValue>,
    bookings: DashMap<BookingId, Booking>,
    movements: DashMap<MovementId, Movement>,
    expense_items: DashMap<ExpenseItemId, ExpenseItem>,
    /// Serializes check-then-act booking writes.
    booking_write: Mutex<()>,
    next_id: AtomicU64,
    policy: BookingPolicy,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_policy(BookingPolicy::default())
    }

    pub fn with_policy(policy: BookingPolicy) -> Self {
        Engine {
            properties: DashMap::new(),
            channels: DashMap::new(),
            config_values: DashMap::new(),
            bookings: DashMap::new(),
            movements: DashMap::new(),
            expense_items: DashMap::new(),
            booking_write: Mutex::new(()),
            next_id: AtomicU64::new(1),
            policy,
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // === Catalog and reference data ===

    /// Registers a property for the calling tenant.
    pub fn add_property(&self, ctx: TenantContext, name: &str) -> Property {
        let property = Property {
            id: PropertyId(self.allocate_id()),
            tenant_id: ctx.tenant_id(),
            name: name.to_string(),
        };
        self.properties.insert(property.id, property.clone());
        property
    }

    /// Registers a sales channel. The optional tax type must be a tax-type
    /// catalog row of the same tenant.
    pub fn add_channel(
        &self,
        ctx: TenantContext,
        input: NewChannel,
    ) -> Result<SalesChannel, EngineError> {
        if let Some(tax_type_id) = input.tax_type_id {
            self.config_value_in(ctx, tax_type_id, ConfigCategory::TaxType)?;
        }
        let channel = SalesChannel {
            id: ChannelId(self.allocate_id()),
            tenant_id: ctx.tenant_id(),
            name: input.name,
            sales_commission: input.sales_commission,
            collection_commission: input.collection_commission,
            apply_tax: input.apply_tax,
            tax_type_id: input.tax_type_id,
        };
        self.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    /// Adds a configuration catalog row for the calling tenant.
    pub fn add_config_value(&self, ctx: TenantContext, input: NewConfigValue) -> ConfigValue {
        let value = ConfigValue {
            id: ConfigValueId(self.allocate_id()),
            tenant_id: ctx.tenant_id(),
            category: input.category,
            value: input.value,
            label: input.label,
            description: input.description,
            color: input.color,
            icon: input.icon,
            sort_order: input.sort_order,
        };
        self.config_values.insert(value.id, value.clone());
        value
    }

    /// Seeds the minimal catalog a tenant needs to operate: booking statuses
    /// and types, movement types and statuses. Real tenants extend these
    /// through configuration CRUD, which is outside the core.
    pub fn seed_default_catalog(&self, ctx: TenantContext) -> CatalogDefaults {
        let add = |category, value: &str, label: &str| {
            self.add_config_value(ctx, NewConfigValue::new(category, value, label))
                .id
        };
        CatalogDefaults {
            confirmed: add(ConfigCategory::BookingStatus, "confirmed", "Confirmed"),
            cancelled: add(ConfigCategory::BookingStatus, "cancelled", "Cancelled"),
            standard: add(ConfigCategory::BookingType, "standard", "Booking"),
            closed_period: add(ConfigCategory::BookingType, "closed_period", "Closed period"),
            income: add(ConfigCategory::MovementType, "income", "Income"),
            expense: add(ConfigCategory::MovementType, "expense", "Expense"),
            completed: add(ConfigCategory::MovementStatus, "completed", "Completed"),
            pending_payment: add(ConfigCategory::MovementStatus, "pending", "Pending"),
            failed: add(ConfigCategory::MovementStatus, "failed", "Failed"),
        }
    }

    /// Label of a catalog row, for joined projections. `None` when the id is
    /// unknown or foreign.
    pub fn config_label(&self, ctx: TenantContext, id: ConfigValueId) -> Option<String> {
        self.config_values
            .get(&id)
            .filter(|cv| cv.tenant_id == ctx.tenant_id())
            .map(|cv| cv.label.clone())
    }

    fn property(&self, ctx: TenantContext, id: PropertyId) -> Result<Property, EngineError> {
        self.properties
            .get(&id)
            .filter(|p| p.tenant_id == ctx.tenant_id())
            .map(|p| p.value().clone())
            .ok_or(EngineError::NotFound)
    }

    fn channel(&self, ctx: TenantContext, id: ChannelId) -> Result<SalesChannel, EngineError> {
        self.channels
            .get(&id)
            .filter(|c| c.tenant_id == ctx.tenant_id())
            .map(|c| c.value().clone())
            .ok_or(EngineError::NotFound)
    }

    fn config_value_in(
        &self,
        ctx: TenantContext,
        id: ConfigValueId,
        category: ConfigCategory,
    ) -> Result<ConfigValue, EngineError> {
        let value = self
            .config_values
            .get(&id)
            .filter(|cv| cv.tenant_id == ctx.tenant_id())
            .map(|cv| cv.value().clone())
            .ok_or(EngineError::NotFound)?;
        if value.category != category {
            return Err(EngineError::WrongConfigCategory);
        }
        Ok(value)
    }

    /// Resolves a channel's terms against the tenant catalog.
    fn channel_rates(&self, ctx: TenantContext, channel: &SalesChannel) -> ChannelRates {
        let tax_pct = if channel.apply_tax {
            channel
                .tax_type_id
                .and_then(|id| self.config_value_in(ctx, id, ConfigCategory::TaxType).ok())
                .map(|cv| cv.tax_rate())
                .unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        ChannelRates {
            sales_pct: channel.sales_commission,
            collection_pct: channel.collection_commission,
            tax_pct,
        }
    }

    // === Availability ===

    fn check_policy(&self, range: &DateRange) -> Result<(), EngineError> {
        if let Some(min) = self.policy.min_check_in {
            if range.check_in() < min {
                return Err(EngineError::CheckInTooEarly);
            }
        }
        Ok(())
    }

    fn property_bookings(&self, ctx: TenantContext, property_id: PropertyId) -> Vec<Booking> {
        self.bookings
            .iter()
            .filter(|b| b.tenant_id == ctx.tenant_id() && b.property_id == property_id)
            .map(|b| b.value().clone())
            .collect()
    }

    /// Checks whether a candidate range is free on a property.
    ///
    /// Read-only; the racing-writer guarantee comes from the booking write
    /// lock taken by the mutating operations, not from this check.
    pub fn check_availability(
        &self,
        ctx: TenantContext,
        property_id: PropertyId,
        range: &DateRange,
        exclude: Option<BookingId>,
    ) -> Result<Availability, EngineError> {
        self.property(ctx, property_id)?;
        self.check_policy(range)?;
        let bookings = self.property_bookings(ctx, property_id);
        Ok(availability::check(bookings.iter(), range, exclude))
    }

    /// Calendar days of a property occupied by active bookings (closed
    /// periods included) inside a window.
    pub fn list_blocked_dates(
        &self,
        ctx: TenantContext,
        property_id: PropertyId,
        window: &DateRange,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        self.property(ctx, property_id)?;
        let bookings = self.property_bookings(ctx, property_id);
        Ok(availability::blocked_days(bookings.iter(), window))
    }

    // === Booking lifecycle ===

    /// Creates a booking: field validation, availability, commission
    /// derivation, persist. Returns the stored record; its pending amount at
    /// this point equals the payment basis since nothing is paid yet.
    pub fn create_booking(
        &self,
        ctx: TenantContext,
        input: NewBooking,
    ) -> Result<Booking, EngineError> {
        if input.total_amount < Decimal::ZERO {
            return Err(EngineError::NegativeAmount);
        }
        let status = self.config_value_in(ctx, input.status_id, ConfigCategory::BookingStatus)?;
        let booking_type = self.config_value_in(ctx, input.type_id, ConfigCategory::BookingType)?;
        let status_kind = BookingStatusKind::parse(&status.value);
        let type_kind = BookingTypeKind::parse(&booking_type.value);

        let range = DateRange::new(input.check_in_date, input.check_out_date)?;
        self.check_policy(&range)?;

        if type_kind.carries_guest() {
            if input.person_id.is_none() {
                return Err(EngineError::MissingGuest);
            }
            if input.guests < 1 {
                return Err(EngineError::InvalidGuestCount);
            }
        }

        self.property(ctx, input.property_id)?;

        let rates = match input.channel_id {
            Some(channel_id) => {
                let channel = self.channel(ctx, channel_id)?;
                Some(self.channel_rates(ctx, &channel))
            }
            None => None,
        };

        let _guard = self.booking_write.lock();

        if status_kind.is_active() {
            let bookings = self.property_bookings(ctx, input.property_id);
            let availability = availability::check(bookings.iter(), &range, None);
            if !availability.available {
                return Err(EngineError::BookingOverlap {
                    conflicting: availability.conflicting,
                });
            }
        }

        let breakdown = commission::compute_amounts(input.total_amount, rates.as_ref());
        let mut booking = Booking {
            id: BookingId(self.allocate_id()),
            tenant_id: ctx.tenant_id(),
            property_id: input.property_id,
            person_id: input.person_id,
            channel_id: input.channel_id,
            range,
            guests: input.guests,
            total_amount: input.total_amount,
            sales_commission_amount: Decimal::ZERO,
            collection_commission_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            net_amount: Decimal::ZERO,
            status_id: status.id,
            status_kind,
            type_id: booking_type.id,
            type_kind,
            overrides: AmountOverrides::default(),
        };
        booking.apply_breakdown(&breakdown);
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    pub fn get_booking(&self, ctx: TenantContext, id: BookingId) -> Result<Booking, EngineError> {
        self.bookings
            .get(&id)
            .filter(|b| b.tenant_id == ctx.tenant_id())
            .map(|b| b.value().clone())
            .ok_or(EngineError::NotFound)
    }

    /// Tenant's bookings in creation order.
    pub fn list_bookings(&self, ctx: TenantContext) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.tenant_id == ctx.tenant_id())
            .map(|b| b.value().clone())
            .collect();
        bookings.sort_by_key(|b| b.id);
        bookings
    }

    /// Applies a partial update. A date or property change re-validates
    /// availability against *other* bookings; a total or channel change
    /// reruns the commission calculator, preserving operator-pinned fields.
    pub fn update_booking(
        &self,
        ctx: TenantContext,
        id: BookingId,
        patch: BookingPatch,
    ) -> Result<Booking, EngineError> {
        let _guard = self.booking_write.lock();

        let mut booking = self.get_booking(ctx, id)?;

        let range = DateRange::new(
            patch.check_in_date.unwrap_or(booking.range.check_in()),
            patch.check_out_date.unwrap_or(booking.range.check_out()),
        )?;
        let property_id = patch.property_id.unwrap_or(booking.property_id);
        if patch.property_id.is_some() {
            self.property(ctx, property_id)?;
        }
        if patch.touches_schedule() {
            self.check_policy(&range)?;
            if booking.is_active() {
                let bookings = self.property_bookings(ctx, property_id);
                let availability = availability::check(bookings.iter(), &range, Some(id));
                if !availability.available {
                    return Err(EngineError::BookingOverlap {
                        conflicting: availability.conflicting,
                    });
                }
            }
        }

        if let Some(total) = patch.total_amount {
            if total < Decimal::ZERO {
                return Err(EngineError::NegativeAmount);
            }
            booking.total_amount = total;
        }
        if let Some(channel_id) = patch.channel_id {
            if let Some(channel_id) = channel_id {
                self.channel(ctx, channel_id)?;
            }
            booking.channel_id = channel_id;
        }
        if let Some(person_id) = patch.person_id {
            if person_id.is_none() && booking.type_kind.carries_guest() {
                return Err(EngineError::MissingGuest);
            }
            booking.person_id = person_id;
        }
        if let Some(guests) = patch.guests {
            if booking.type_kind.carries_guest() && guests < 1 {
                return Err(EngineError::InvalidGuestCount);
            }
            booking.guests = guests;
        }
        booking.property_id = property_id;
        booking.range = range;

        // Explicit deduction writes pin the field against recalculation.
        if let Some(amount) = patch.sales_commission_amount {
            booking.sales_commission_amount = amount;
            booking.overrides.sales_commission = true;
        }
        if let Some(amount) = patch.collection_commission_amount {
            booking.collection_commission_amount = amount;
            booking.overrides.collection_commission = true;
        }
        if let Some(amount) = patch.tax_amount {
            booking.tax_amount = amount;
            booking.overrides.tax = true;
        }

        if patch.touches_pricing() {
            let rates = match booking.channel_id {
                Some(channel_id) => {
                    let channel = self.channel(ctx, channel_id)?;
                    Some(self.channel_rates(ctx, &channel))
                }
                None => None,
            };
            let breakdown = commission::compute_amounts(booking.total_amount, rates.as_ref());
            booking.apply_breakdown(&breakdown);
        } else {
            booking.recompute_net();
        }

        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    /// Moves a booking to an arbitrary catalog status, enforcing the two
    /// structural rules: entering an active status re-validates availability
    /// (excluding the booking itself); entering cancelled always succeeds.
    pub fn set_booking_status(
        &self,
        ctx: TenantContext,
        id: BookingId,
        status_id: ConfigValueId,
    ) -> Result<Booking, EngineError> {
        let status = self.config_value_in(ctx, status_id, ConfigCategory::BookingStatus)?;
        let status_kind = BookingStatusKind::parse(&status.value);

        let _guard = self.booking_write.lock();
        let mut booking = self.get_booking(ctx, id)?;

        if status_kind.is_active() {
            let bookings = self.property_bookings(ctx, booking.property_id);
            let availability = availability::check(bookings.iter(), &booking.range, Some(id));
            if !availability.available {
                return Err(EngineError::BookingOverlap {
                    conflicting: availability.conflicting,
                });
            }
        }

        booking.status_id = status.id;
        booking.status_kind = status_kind;
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    /// Soft-terminates a booking: status flips to the tenant's cancelled
    /// value, the row stays, its range is freed for future bookings, and any
    /// recorded movements remain untouched as an audit trail.
    pub fn cancel_booking(&self, ctx: TenantContext, id: BookingId) -> Result<Booking, EngineError> {
        let cancelled = self
            .config_values
            .iter()
            .find(|cv| {
                cv.tenant_id == ctx.tenant_id()
                    && cv.category == ConfigCategory::BookingStatus
                    && BookingStatusKind::parse(&cv.value).is_cancelled()
            })
            .map(|cv| cv.id)
            .ok_or(EngineError::MissingCatalogValue(
                "no cancelled booking status",
            ))?;

        let _guard = self.booking_write.lock();
        let mut booking = self.get_booking(ctx, id)?;
        booking.status_id = cancelled;
        booking.status_kind = BookingStatusKind::Cancelled;
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    /// Paid/pending figures of a booking, recomputed from the movement
    /// stream on every call. Nothing is persisted, so the result can never go
    /// stale; calling it twice without intervening writes yields identical
    /// figures.
    pub fn recompute_booking_paid(
        &self,
        ctx: TenantContext,
        id: BookingId,
    ) -> Result<BookingFinancials, EngineError> {
        let booking = self.get_booking(ctx, id)?;
        let movements: Vec<Movement> = self
            .movements
            .iter()
            .filter(|m| m.tenant_id == ctx.tenant_id())
            .map(|m| m.value().clone())
            .collect();
        let paid = ledger::paid_amount(movements.iter(), id);
        Ok(ledger::financials(&booking, paid))
    }

    // === Movements ===

    /// Records a movement. Income movements may reference a booking of the
    /// same tenant.
    pub fn create_movement(
        &self,
        ctx: TenantContext,
        input: NewMovement,
    ) -> Result<Movement, EngineError> {
        if input.amount < Decimal::ZERO {
            return Err(EngineError::NegativeAmount);
        }
        let movement_type =
            self.config_value_in(ctx, input.type_id, ConfigCategory::MovementType)?;
        let status = self.config_value_in(ctx, input.status_id, ConfigCategory::MovementStatus)?;
        if let Some(booking_id) = input.booking_id {
            self.get_booking(ctx, booking_id)?;
        }

        let movement = Movement {
            id: MovementId(self.allocate_id()),
            tenant_id: ctx.tenant_id(),
            type_id: movement_type.id,
            type_kind: MovementKind::parse(&movement_type.value),
            status_id: status.id,
            status_kind: MovementStatusKind::parse(&status.value),
            amount: input.amount,
            movement_date: input.movement_date,
            booking_id: input.booking_id,
            service_provider_id: input.service_provider_id,
            notes: input.notes,
        };
        self.movements.insert(movement.id, movement.clone());
        Ok(movement)
    }

    pub fn get_movement(
        &self,
        ctx: TenantContext,
        id: MovementId,
    ) -> Result<Movement, EngineError> {
        self.movements
            .get(&id)
            .filter(|m| m.tenant_id == ctx.tenant_id())
            .map(|m| m.value().clone())
            .ok_or(EngineError::NotFound)
    }

    /// Tenant's movements in creation order.
    pub fn list_movements(&self, ctx: TenantContext) -> Vec<Movement> {
        let mut movements: Vec<Movement> = self
            .movements
            .iter()
            .filter(|m| m.tenant_id == ctx.tenant_id())
            .map(|m| m.value().clone())
            .collect();
        movements.sort_by_key(|m| m.id);
        movements
    }

    /// Applies a partial update. On an itemized movement the amount is
    /// re-derived from the line items afterwards, so a direct amount write
    /// only sticks on non-itemized movements.
    pub fn update_movement(
        &self,
        ctx: TenantContext,
        id: MovementId,
        patch: MovementPatch,
    ) -> Result<Movement, EngineError> {
        let mut movement = self.get_movement(ctx, id)?;

        if let Some(amount) = patch.amount {
            if amount < Decimal::ZERO {
                return Err(EngineError::NegativeAmount);
            }
            movement.amount = amount;
        }
        if let Some(status_id) = patch.status_id {
            let status = self.config_value_in(ctx, status_id, ConfigCategory::MovementStatus)?;
            movement.status_id = status.id;
            movement.status_kind = MovementStatusKind::parse(&status.value);
        }
        if let Some(date) = patch.movement_date {
            movement.movement_date = date;
        }
        if let Some(booking_id) = patch.booking_id {
            if let Some(booking_id) = booking_id {
                self.get_booking(ctx, booking_id)?;
            }
            movement.booking_id = booking_id;
        }
        if let Some(notes) = patch.notes {
            movement.notes = Some(notes);
        }

        self.movements.insert(movement.id, movement);
        self.recompute_movement_total(ctx, id)?;
        self.get_movement(ctx, id)
    }

    /// Deletes a movement and its line items.
    pub fn delete_movement(&self, ctx: TenantContext, id: MovementId) -> Result<(), EngineError> {
        self.get_movement(ctx, id)?;
        self.movements.remove(&id);
        self.expense_items.retain(|_, item| item.movement_id != id);
        Ok(())
    }

    // === Expense items ===

    /// Line items of a movement in creation order.
    pub fn list_expense_items(
        &self,
        ctx: TenantContext,
        movement_id: MovementId,
    ) -> Result<Vec<ExpenseItem>, EngineError> {
        self.get_movement(ctx, movement_id)?;
        let mut items: Vec<ExpenseItem> = self
            .expense_items
            .iter()
            .filter(|i| i.movement_id == movement_id)
            .map(|i| i.value().clone())
            .collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    /// Adds a line item and re-derives the movement total.
    pub fn create_expense_item(
        &self,
        ctx: TenantContext,
        movement_id: MovementId,
        input: NewExpenseItem,
    ) -> Result<ExpenseItem, EngineError> {
        self.get_movement(ctx, movement_id)?;
        if input.service_name.trim().is_empty() {
            return Err(EngineError::EmptyServiceName);
        }
        if input.amount <= Decimal::ZERO {
            return Err(EngineError::NonPositiveAmount);
        }
        let tax_rate = match input.tax_type_id {
            Some(tax_type_id) => self
                .config_value_in(ctx, tax_type_id, ConfigCategory::TaxType)?
                .tax_rate(),
            None => Decimal::ZERO,
        };
        let (tax_amount, total_amount) = input.resolve_amounts(tax_rate);

        let item = ExpenseItem {
            id: ExpenseItemId(self.allocate_id()),
            movement_id,
            tenant_id: ctx.tenant_id(),
            service_provider_service_id: input.service_provider_service_id,
            service_name: input.service_name,
            amount: input.amount,
            tax_type_id: input.tax_type_id,
            tax_amount,
            total_amount,
            notes: input.notes,
        };
        self.expense_items.insert(item.id, item.clone());
        self.recompute_movement_total(ctx, movement_id)?;
        Ok(item)
    }

    pub fn get_expense_item(
        &self,
        ctx: TenantContext,
        id: ExpenseItemId,
    ) -> Result<ExpenseItem, EngineError> {
        self.expense_items
            .get(&id)
            .filter(|i| i.tenant_id == ctx.tenant_id())
            .map(|i| i.value().clone())
            .ok_or(EngineError::NotFound)
    }

    /// Applies a partial update to a line item and re-derives its figures and
    /// the movement total.
    pub fn update_expense_item(
        &self,
        ctx: TenantContext,
        id: ExpenseItemId,
        patch: ExpenseItemPatch,
    ) -> Result<ExpenseItem, EngineError> {
        let mut item = self.get_expense_item(ctx, id)?;

        if let Some(service_name) = patch.service_name {
            if service_name.trim().is_empty() {
                return Err(EngineError::EmptyServiceName);
            }
            item.service_name = service_name;
        }
        if let Some(amount) = patch.amount {
            if amount <= Decimal::ZERO {
                return Err(EngineError::NonPositiveAmount);
            }
            item.amount = amount;
        }
        if let Some(tax_type_id) = patch.tax_type_id {
            self.config_value_in(ctx, tax_type_id, ConfigCategory::TaxType)?;
            item.tax_type_id = Some(tax_type_id);
        }

        // Re-derive dependent figures when their inputs moved, unless the
        // caller pinned them in the same patch.
        let inputs_touched = patch.amount.is_some() || patch.tax_type_id.is_some();
        match patch.tax_amount {
            Some(tax_amount) => item.tax_amount = tax_amount,
            None if inputs_touched => {
                let tax_rate = match item.tax_type_id {
                    Some(tax_type_id) => self
                        .config_value_in(ctx, tax_type_id, ConfigCategory::TaxType)?
                        .tax_rate(),
                    None => Decimal::ZERO,
                };
                item.tax_amount =
                    commission::round_money(item.amount * tax_rate / Decimal::from(100));
            }
            None => {}
        }
        match patch.total_amount {
            Some(total_amount) => item.total_amount = total_amount,
            None if inputs_touched || patch.tax_amount.is_some() => {
                item.total_amount = item.amount + item.tax_amount;
            }
            None => {}
        }

        if let Some(notes) = patch.notes {
            item.notes = Some(notes);
        }

        let movement_id = item.movement_id;
        self.expense_items.insert(item.id, item.clone());
        self.recompute_movement_total(ctx, movement_id)?;
        Ok(item)
    }

    /// Deletes a line item. The last remaining item of an itemized movement
    /// cannot be deleted; the movement and the item are left untouched.
    pub fn delete_expense_item(
        &self,
        ctx: TenantContext,
        id: ExpenseItemId,
    ) -> Result<(), EngineError> {
        let item = self.get_expense_item(ctx, id)?;
        let sibling_count = self
            .expense_items
            .iter()
            .filter(|i| i.movement_id == item.movement_id)
            .count();
        if sibling_count <= 1 {
            return Err(EngineError::LastExpenseItem);
        }
        self.expense_items.remove(&id);
        self.recompute_movement_total(ctx, item.movement_id)?;
        Ok(())
    }

    /// Rewrites an itemized movement's amount as the sum of its line items.
    ///
    /// Idempotent: it recomputes the whole sum instead of applying deltas. A
    /// movement without items keeps its own amount; a movement deleted
    /// concurrently is a no-op rather than an error.
    pub fn recompute_movement_total(
        &self,
        ctx: TenantContext,
        movement_id: MovementId,
    ) -> Result<(), EngineError> {
        let items: Vec<ExpenseItem> = self
            .expense_items
            .iter()
            .filter(|i| i.movement_id == movement_id && i.tenant_id == ctx.tenant_id())
            .map(|i| i.value().clone())
            .collect();
        let Some(total) = ledger::items_total(items.iter()) else {
            return Ok(());
        };
        match self.movements.get_mut(&movement_id) {
            Some(mut movement) if movement.tenant_id == ctx.tenant_id() => {
                movement.amount = total;
            }
            // Vanished mid-operation: converging on a no-op is the contract.
            _ => {
                tracing::debug!(movement = %movement_id, "recompute on missing movement skipped");
            }
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
