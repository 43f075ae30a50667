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

//! Integration tests for the REST API surface.
//!
//! These tests bind a real listener and exercise the movement and booking
//! endpoints end to end, including the error envelope and status codes.

use rental_ledger_rs::http::{AppState, router};
use rental_ledger_rs::{
    CatalogDefaults, ChannelId, ConfigCategory, Engine, NewChannel, NewConfigValue, PropertyId,
    TenantContext, TenantId,
};
use reqwest::Client;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Server Setup ===

struct TestServer {
    base: String,
    engine: Arc<Engine>,
    client: Client,
}

async fn spawn_server() -> TestServer {
    let engine = Arc::new(Engine::new());
    let state = AppState {
        engine: Arc::clone(&engine),
    };
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        engine,
        client: Client::new(),
    }
}

struct Seed {
    catalog: CatalogDefaults,
    property: PropertyId,
    channel: ChannelId,
}

fn seed(engine: &Engine, tenant: u64) -> Seed {
    let ctx = TenantContext::new(TenantId(tenant));
    let catalog = engine.seed_default_catalog(ctx);
    let property = engine.add_property(ctx, "Casa Azul").id;
    let tax_type = engine.add_config_value(
        ctx,
        NewConfigValue::new(ConfigCategory::TaxType, "vat", "VAT").with_description("21"),
    );
    let channel = engine
        .add_channel(
            ctx,
            NewChannel {
                name: "OTA".to_string(),
                sales_commission: dec!(15),
                collection_commission: dec!(3),
                apply_tax: true,
                tax_type_id: Some(tax_type.id),
            },
        )
        .unwrap()
        .id;
    Seed {
        catalog,
        property,
        channel,
    }
}

fn money(value: &Value) -> rust_decimal::Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn movement_body(seed: &Seed, amount: &str) -> Value {
    json!({
        "type_id": seed.catalog.expense.0,
        "status_id": seed.catalog.completed.0,
        "amount": amount,
        "movement_date": "2025-06-01",
    })
}

// === Authentication ===

#[tokio::test]
async fn missing_tenant_header_is_unauthorized() {
    let server = spawn_server().await;

    let response = server
        .client
        .get(format!("{}/api/movements/1", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_tenant_header_is_unauthorized() {
    let server = spawn_server().await;

    let response = server
        .client
        .get(format!("{}/api/movements/1", server.base))
        .header("x-tenant-id", "not-a-number")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

// === Movements ===

#[tokio::test]
async fn movement_crud_roundtrip() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    // Create
    let response = server
        .client
        .post(format!("{}/api/movements", server.base))
        .header("x-tenant-id", "1")
        .json(&movement_body(&s, "99.90"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_u64().unwrap();
    assert_eq!(money(&created["amount"]), dec!(99.90));
    assert_eq!(created["movement_type"], "Expense");
    assert_eq!(created["status"], "Completed");

    // Read
    let response = server
        .client
        .get(format!("{}/api/movements/{}", server.base, id))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Update
    let response = server
        .client
        .put(format!("{}/api/movements/{}", server.base, id))
        .header("x-tenant-id", "1")
        .json(&json!({ "amount": "120.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(money(&updated["amount"]), dec!(120.00));

    // Delete
    let response = server
        .client
        .delete(format!("{}/api/movements/{}", server.base, id))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    // Gone
    let response = server
        .client
        .get(format!("{}/api/movements/{}", server.base, id))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn cross_tenant_movement_reads_are_not_found() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);
    seed(&server.engine, 2);

    let response = server
        .client
        .post(format!("{}/api/movements", server.base))
        .header("x-tenant-id", "1")
        .json(&movement_body(&s, "50"))
        .send()
        .await
        .unwrap();
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_u64().unwrap();

    // The other tenant sees 404, not 403.
    let response = server
        .client
        .get(format!("{}/api/movements/{}", server.base, id))
        .header("x-tenant-id", "2")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not found");
}

// === Expense items ===

#[tokio::test]
async fn expense_item_flow() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    let response = server
        .client
        .post(format!("{}/api/movements", server.base))
        .header("x-tenant-id", "1")
        .json(&movement_body(&s, "0"))
        .send()
        .await
        .unwrap();
    let movement: Value = response.json().await.unwrap();
    let movement_id = movement["id"].as_u64().unwrap();

    // First item: 45.50 without tax.
    let response = server
        .client
        .post(format!(
            "{}/api/movements/{}/expense-items",
            server.base, movement_id
        ))
        .header("x-tenant-id", "1")
        .json(&json!({
            "service_name": "cleaning",
            "amount": "45.50",
            "tax_amount": "0",
            "total_amount": "45.50",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let first: Value = response.json().await.unwrap();

    // Second item: 12.25.
    let response = server
        .client
        .post(format!(
            "{}/api/movements/{}/expense-items",
            server.base, movement_id
        ))
        .header("x-tenant-id", "1")
        .json(&json!({
            "service_name": "laundry",
            "amount": "12.25",
            "tax_amount": "0",
            "total_amount": "12.25",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let second: Value = response.json().await.unwrap();

    // Movement total recomputed.
    let response = server
        .client
        .get(format!("{}/api/movements/{}", server.base, movement_id))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    let movement: Value = response.json().await.unwrap();
    assert_eq!(money(&movement["amount"]), dec!(57.75));

    // Listing joins labels.
    let response = server
        .client
        .get(format!(
            "{}/api/movements/{}/expense-items",
            server.base, movement_id
        ))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    let items: Value = response.json().await.unwrap();
    assert_eq!(items.as_array().unwrap().len(), 2);
    assert_eq!(items[0]["service_name"], "cleaning");

    // Delete one item: total recomputes to the remainder.
    let response = server
        .client
        .delete(format!(
            "{}/api/movements/expense-items/{}",
            server.base,
            first["id"].as_u64().unwrap()
        ))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .get(format!("{}/api/movements/{}", server.base, movement_id))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    let movement: Value = response.json().await.unwrap();
    assert_eq!(money(&movement["amount"]), dec!(12.25));

    // Deleting the last remaining item is rejected with 400.
    let response = server
        .client
        .delete(format!(
            "{}/api/movements/expense-items/{}",
            server.base,
            second["id"].as_u64().unwrap()
        ))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "an itemized expense must retain at least one line item"
    );
}

#[tokio::test]
async fn expense_item_validation() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    let response = server
        .client
        .post(format!("{}/api/movements", server.base))
        .header("x-tenant-id", "1")
        .json(&movement_body(&s, "0"))
        .send()
        .await
        .unwrap();
    let movement: Value = response.json().await.unwrap();
    let movement_id = movement["id"].as_u64().unwrap();

    // Blank service name.
    let response = server
        .client
        .post(format!(
            "{}/api/movements/{}/expense-items",
            server.base, movement_id
        ))
        .header("x-tenant-id", "1")
        .json(&json!({ "service_name": "  ", "amount": "10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Non-positive amount.
    let response = server
        .client
        .post(format!(
            "{}/api/movements/{}/expense-items",
            server.base, movement_id
        ))
        .header("x-tenant-id", "1")
        .json(&json!({ "service_name": "cleaning", "amount": "0" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

// === Bookings ===

#[tokio::test]
async fn booking_amounts_over_http() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    let response = server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&json!({
            "property_id": s.property.0,
            "person_id": 9,
            "channel_id": s.channel.0,
            "check_in_date": "2025-06-01",
            "check_out_date": "2025-06-05",
            "guests": 2,
            "total_amount": "1000",
            "status_id": s.catalog.confirmed.0,
            "type_id": s.catalog.standard.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let booking: Value = response.json().await.unwrap();
    assert_eq!(money(&booking["sales_commission_amount"]), dec!(150));
    assert_eq!(money(&booking["collection_commission_amount"]), dec!(30));
    assert_eq!(money(&booking["tax_amount"]), dec!(210));
    assert_eq!(money(&booking["net_amount"]), dec!(610));
    assert_eq!(money(&booking["paid_amount"]), dec!(0));
    assert_eq!(money(&booking["pending_amount"]), dec!(610));
    assert_eq!(booking["status"], "Confirmed");

    // Record a settled payment and read the booking back.
    let booking_id = booking["id"].as_u64().unwrap();
    server
        .client
        .post(format!("{}/api/movements", server.base))
        .header("x-tenant-id", "1")
        .json(&json!({
            "type_id": s.catalog.income.0,
            "status_id": s.catalog.completed.0,
            "amount": "610.00",
            "movement_date": "2025-06-02",
            "booking_id": booking_id,
        }))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(format!("{}/api/bookings/{}", server.base, booking_id))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    let booking: Value = response.json().await.unwrap();
    assert_eq!(money(&booking["paid_amount"]), dec!(610));
    assert_eq!(money(&booking["pending_amount"]), dec!(0));
}

#[tokio::test]
async fn overlapping_booking_conflicts_over_http() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    let body = |check_in: &str, check_out: &str| {
        json!({
            "property_id": s.property.0,
            "person_id": 9,
            "check_in_date": check_in,
            "check_out_date": check_out,
            "guests": 2,
            "total_amount": "500",
            "status_id": s.catalog.confirmed.0,
            "type_id": s.catalog.standard.0,
        })
    };

    let response = server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&body("2025-06-01", "2025-06-05"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    // Overlap on June 4.
    let response = server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&body("2025-06-04", "2025-06-08"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let error: Value = response.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("conflict"));

    // Back-to-back is fine.
    let response = server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&body("2025-06-05", "2025-06-08"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn availability_and_blocked_dates_endpoints() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&json!({
            "property_id": s.property.0,
            "person_id": 9,
            "check_in_date": "2025-06-01",
            "check_out_date": "2025-06-03",
            "guests": 2,
            "total_amount": "500",
            "status_id": s.catalog.confirmed.0,
            "type_id": s.catalog.standard.0,
        }))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(format!(
            "{}/api/properties/{}/availability?start=2025-06-02&end=2025-06-04",
            server.base, s.property.0
        ))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let availability: Value = response.json().await.unwrap();
    assert_eq!(availability["available"], false);
    assert_eq!(
        availability["conflicting_booking_ids"].as_array().unwrap().len(),
        1
    );

    let response = server
        .client
        .get(format!(
            "{}/api/properties/{}/blocked-dates?start=2025-06-01&end=2025-06-30",
            server.base, s.property.0
        ))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    let blocked: Value = response.json().await.unwrap();
    assert_eq!(blocked, json!(["2025-06-01", "2025-06-02"]));
}

#[tokio::test]
async fn cancel_endpoint_frees_the_range() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    let body = json!({
        "property_id": s.property.0,
        "person_id": 9,
        "check_in_date": "2025-06-01",
        "check_out_date": "2025-06-05",
        "guests": 2,
        "total_amount": "500",
        "status_id": s.catalog.confirmed.0,
        "type_id": s.catalog.standard.0,
    });

    let response = server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&body)
        .send()
        .await
        .unwrap();
    let booking: Value = response.json().await.unwrap();
    let booking_id = booking["id"].as_u64().unwrap();

    let response = server
        .client
        .post(format!(
            "{}/api/bookings/{}/cancel",
            server.base, booking_id
        ))
        .header("x-tenant-id", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let cancelled: Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "Cancelled");

    // The same range can be booked again.
    let response = server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn validation_errors_use_the_envelope() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    // Inverted date range.
    let response = server
        .client
        .post(format!("{}/api/bookings", server.base))
        .header("x-tenant-id", "1")
        .json(&json!({
            "property_id": s.property.0,
            "person_id": 9,
            "check_in_date": "2025-06-05",
            "check_out_date": "2025-06-01",
            "guests": 2,
            "total_amount": "500",
            "status_id": s.catalog.confirmed.0,
            "type_id": s.catalog.standard.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "check-out date must be after check-in date");
}

#[tokio::test]
async fn concurrent_booking_requests_have_a_single_winner() {
    let server = spawn_server().await;
    let s = seed(&server.engine, 1);

    let requests: Vec<_> = (0..8)
        .map(|i| {
            let client = server.client.clone();
            let url = format!("{}/api/bookings", server.base);
            let body = json!({
                "property_id": s.property.0,
                "person_id": i + 1,
                "check_in_date": "2025-06-01",
                "check_out_date": "2025-06-05",
                "guests": 1,
                "total_amount": "100",
                "status_id": s.catalog.confirmed.0,
                "type_id": s.catalog.standard.0,
            });
            async move {
                client
                    .post(url)
                    .header("x-tenant-id", "1")
                    .json(&body)
                    .send()
                    .await
                    .unwrap()
                    .status()
                    .as_u16()
            }
        })
        .collect();

    let statuses = futures::future::join_all(requests).await;
    assert_eq!(statuses.iter().filter(|s| **s == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 7);
}
