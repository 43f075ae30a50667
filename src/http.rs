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

//! REST surface over the engine.
//!
//! Authentication and tenant resolution are external collaborators; here the
//! tenant arrives as the `x-tenant-id` header and a missing or malformed
//! header is a 401 before any store access. Every failure body is the same
//! envelope: `{ "error": "..." }`.

use crate::availability::DateRange;
use crate::base::{
    BookingId, ChannelId, ConfigValueId, ExpenseItemId, MovementId, PersonId, PropertyId,
    ServiceProviderId, TenantContext, TenantId,
};
use crate::booking::{Booking, BookingPatch, NewBooking};
use crate::engine::Engine;
use crate::error::{EngineError, ErrorKind};
use crate::movement::{
    ExpenseItem, ExpenseItemPatch, Movement, MovementPatch, NewExpenseItem, NewMovement,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Error envelope returned on every failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Transport-level error wrapper.
pub enum ApiError {
    Unauthorized,
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid tenant credentials".to_string(),
            ),
            ApiError::Engine(err) => match &err {
                // Availability overlaps are real conflicts; the last-item
                // rule is surfaced as a plain bad request.
                EngineError::BookingOverlap { .. } => (StatusCode::CONFLICT, err.to_string()),
                EngineError::LastExpenseItem => (StatusCode::BAD_REQUEST, err.to_string()),
                _ => match err.kind() {
                    ErrorKind::Validation => (StatusCode::BAD_REQUEST, err.to_string()),
                    ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                    ErrorKind::Conflict => (StatusCode::CONFLICT, err.to_string()),
                    ErrorKind::Dependency => {
                        tracing::error!(error = %err, "dependency failure");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "internal error".to_string(),
                        )
                    }
                },
            },
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Resolves the tenant scope from request headers.
fn require_tenant(headers: &HeaderMap) -> Result<TenantContext, ApiError> {
    headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|id| TenantContext::new(TenantId(id)))
        .ok_or(ApiError::Unauthorized)
}

// === Request DTOs ===

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookingRequest {
    pub property_id: Option<PropertyId>,
    pub person_id: Option<PersonId>,
    pub channel_id: Option<ChannelId>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub guests: Option<u32>,
    pub total_amount: Option<Decimal>,
    pub sales_commission_amount: Option<Decimal>,
    pub collection_commission_amount: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
}

impl UpdateBookingRequest {
    fn into_patch(self) -> BookingPatch {
        BookingPatch {
            property_id: self.property_id,
            person_id: self.person_id.map(Some),
            channel_id: self.channel_id.map(Some),
            check_in_date: self.check_in_date,
            check_out_date: self.check_out_date,
            guests: self.guests,
            total_amount: self.total_amount,
            sales_commission_amount: self.sales_commission_amount,
            collection_commission_amount: self.collection_commission_amount,
            tax_amount: self.tax_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub exclude: Option<BookingId>,
}

// === Response DTOs ===

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: BookingId,
    pub property_id: PropertyId,
    pub person_id: Option<PersonId>,
    pub channel_id: Option<ChannelId>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub guests: u32,
    pub total_amount: Decimal,
    pub sales_commission_amount: Decimal,
    pub collection_commission_amount: Decimal,
    pub tax_amount: Decimal,
    pub net_amount: Decimal,
    pub paid_amount: Decimal,
    pub pending_amount: Decimal,
    pub status_id: ConfigValueId,
    pub status: Option<String>,
    pub type_id: ConfigValueId,
    pub booking_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MovementResponse {
    pub id: MovementId,
    pub type_id: ConfigValueId,
    pub movement_type: Option<String>,
    pub status_id: ConfigValueId,
    pub status: Option<String>,
    pub amount: Decimal,
    pub movement_date: NaiveDate,
    pub booking_id: Option<BookingId>,
    pub service_provider_id: Option<ServiceProviderId>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpenseItemResponse {
    pub id: ExpenseItemId,
    pub movement_id: MovementId,
    pub service_provider_service_id: Option<u64>,
    pub service_name: String,
    pub amount: Decimal,
    pub tax_type_id: Option<ConfigValueId>,
    pub tax_type: Option<String>,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub conflicting_booking_ids: Vec<BookingId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub success: bool,
}

fn booking_response(
    state: &AppState,
    ctx: TenantContext,
    booking: Booking,
) -> Result<BookingResponse, ApiError> {
    let financials = state.engine.recompute_booking_paid(ctx, booking.id)?;
    Ok(BookingResponse {
        id: booking.id,
        property_id: booking.property_id,
        person_id: booking.person_id,
        channel_id: booking.channel_id,
        check_in_date: booking.range.check_in(),
        check_out_date: booking.range.check_out(),
        guests: booking.guests,
        total_amount: booking.total_amount,
        sales_commission_amount: booking.sales_commission_amount,
        collection_commission_amount: booking.collection_commission_amount,
        tax_amount: booking.tax_amount,
        net_amount: booking.net_amount,
        paid_amount: financials.paid_amount,
        pending_amount: financials.pending_amount,
        status_id: booking.status_id,
        status: state.engine.config_label(ctx, booking.status_id),
        type_id: booking.type_id,
        booking_type: state.engine.config_label(ctx, booking.type_id),
    })
}

fn movement_response(state: &AppState, ctx: TenantContext, movement: Movement) -> MovementResponse {
    MovementResponse {
        id: movement.id,
        type_id: movement.type_id,
        movement_type: state.engine.config_label(ctx, movement.type_id),
        status_id: movement.status_id,
        status: state.engine.config_label(ctx, movement.status_id),
        amount: movement.amount,
        movement_date: movement.movement_date,
        booking_id: movement.booking_id,
        service_provider_id: movement.service_provider_id,
        notes: movement.notes,
    }
}

fn expense_item_response(
    state: &AppState,
    ctx: TenantContext,
    item: ExpenseItem,
) -> ExpenseItemResponse {
    ExpenseItemResponse {
        id: item.id,
        movement_id: item.movement_id,
        service_provider_service_id: item.service_provider_service_id,
        service_name: item.service_name,
        amount: item.amount,
        tax_type_id: item.tax_type_id,
        tax_type: item
            .tax_type_id
            .and_then(|id| state.engine.config_label(ctx, id)),
        tax_amount: item.tax_amount,
        total_amount: item.total_amount,
        notes: item.notes,
    }
}

// === Booking handlers ===

async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewBooking>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let ctx = require_tenant(&headers)?;
    let booking = state.engine.create_booking(ctx, input)?;
    Ok((
        StatusCode::CREATED,
        Json(booking_response(&state, ctx, booking)?),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let booking = state.engine.get_booking(ctx, id)?;
    Ok(Json(booking_response(&state, ctx, booking)?))
}

async fn update_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<BookingId>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let booking = state.engine.update_booking(ctx, id, request.into_patch())?;
    Ok(Json(booking_response(&state, ctx, booking)?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let booking = state.engine.cancel_booking(ctx, id)?;
    Ok(Json(booking_response(&state, ctx, booking)?))
}

// === Property handlers ===

async fn property_availability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PropertyId>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let range = DateRange::new(query.start, query.end)?;
    let availability = state
        .engine
        .check_availability(ctx, id, &range, query.exclude)?;
    Ok(Json(AvailabilityResponse {
        available: availability.available,
        conflicting_booking_ids: availability.conflicting,
    }))
}

async fn property_blocked_dates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PropertyId>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<NaiveDate>>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let window = DateRange::new(query.start, query.end)?;
    Ok(Json(state.engine.list_blocked_dates(ctx, id, &window)?))
}

// === Movement handlers ===

async fn create_movement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewMovement>,
) -> Result<(StatusCode, Json<MovementResponse>), ApiError> {
    let ctx = require_tenant(&headers)?;
    let movement = state.engine.create_movement(ctx, input)?;
    Ok((
        StatusCode::CREATED,
        Json(movement_response(&state, ctx, movement)),
    ))
}

async fn list_movements(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MovementResponse>>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let movements = state
        .engine
        .list_movements(ctx)
        .into_iter()
        .map(|m| movement_response(&state, ctx, m))
        .collect();
    Ok(Json(movements))
}

async fn get_movement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MovementId>,
) -> Result<Json<MovementResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let movement = state.engine.get_movement(ctx, id)?;
    Ok(Json(movement_response(&state, ctx, movement)))
}

async fn update_movement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MovementId>,
    Json(patch): Json<MovementPatch>,
) -> Result<Json<MovementResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let movement = state.engine.update_movement(ctx, id, patch)?;
    Ok(Json(movement_response(&state, ctx, movement)))
}

async fn delete_movement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MovementId>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    state.engine.delete_movement(ctx, id)?;
    Ok(Json(DeletedResponse { success: true }))
}

// === Expense item handlers ===

async fn list_expense_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MovementId>,
) -> Result<Json<Vec<ExpenseItemResponse>>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let items = state
        .engine
        .list_expense_items(ctx, id)?
        .into_iter()
        .map(|item| expense_item_response(&state, ctx, item))
        .collect();
    Ok(Json(items))
}

async fn create_expense_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MovementId>,
    Json(input): Json<NewExpenseItem>,
) -> Result<(StatusCode, Json<ExpenseItemResponse>), ApiError> {
    let ctx = require_tenant(&headers)?;
    let item = state.engine.create_expense_item(ctx, id, input)?;
    Ok((
        StatusCode::CREATED,
        Json(expense_item_response(&state, ctx, item)),
    ))
}

async fn update_expense_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<ExpenseItemId>,
    Json(patch): Json<ExpenseItemPatch>,
) -> Result<Json<ExpenseItemResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    let item = state.engine.update_expense_item(ctx, item_id, patch)?;
    Ok(Json(expense_item_response(&state, ctx, item)))
}

async fn delete_expense_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<ExpenseItemId>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let ctx = require_tenant(&headers)?;
    state.engine.delete_expense_item(ctx, item_id)?;
    Ok(Json(DeletedResponse { success: true }))
}

// === Router ===

/// Builds the API router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/{id}", get(get_booking).put(update_booking))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
        .route(
            "/api/properties/{id}/availability",
            get(property_availability),
        )
        .route(
            "/api/properties/{id}/blocked-dates",
            get(property_blocked_dates),
        )
        .route("/api/movements", get(list_movements).post(create_movement))
        .route(
            "/api/movements/{id}",
            get(get_movement)
                .put(update_movement)
                .delete(delete_movement),
        )
        .route(
            "/api/movements/{id}/expense-items",
            get(list_expense_items).post(create_expense_item),
        )
        .route(
            "/api/movements/expense-items/{item_id}",
            put(update_expense_item).delete(delete_expense_item),
        )
        .with_state(state)
}
