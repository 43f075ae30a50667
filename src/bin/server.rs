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

//! REST API server for the booking and treasury engine.
//!
//! ## Example Usage
//!
//! ```bash
//! # Start with demo data for tenant 1
//! cargo run --bin server -- --seed-demo
//!
//! # Create a booking
//! curl -X POST http://localhost:3000/api/bookings \
//!   -H "Content-Type: application/json" -H "x-tenant-id: 1" \
//!   -d '{"property_id": 2, "person_id": 9, "check_in_date": "2026-06-01",
//!        "check_out_date": "2026-06-05", "guests": 2, "total_amount": "1000",
//!        "status_id": <confirmed>, "type_id": <standard>}'
//! ```

use clap::Parser;
use rental_ledger_rs::http::{AppState, router};
use rental_ledger_rs::{BookingPolicy, Engine, NewChannel, TenantContext, TenantId};
use rust_decimal_macros::dec;
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Booking and treasury API server.
#[derive(Parser, Debug)]
#[command(name = "rental-ledger-server")]
#[command(about = "Serves the booking and treasury API", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Reject check-ins before today
    #[arg(long)]
    no_past_bookings: bool,

    /// Seed a demo catalog, property and channel for tenant 1
    #[arg(long)]
    seed_demo: bool,
}

fn seed_demo(engine: &Engine) {
    let ctx = TenantContext::new(TenantId(1));
    let catalog = engine.seed_default_catalog(ctx);
    let property = engine.add_property(ctx, "Casa Azul");
    let tax_type = engine.add_config_value(
        ctx,
        rental_ledger_rs::NewConfigValue::new(
            rental_ledger_rs::ConfigCategory::TaxType,
            "vat",
            "VAT",
        )
        .with_description("21"),
    );
    let channel = engine
        .add_channel(
            ctx,
            NewChannel {
                name: "Booking Portal".to_string(),
                sales_commission: dec!(15),
                collection_commission: dec!(3),
                apply_tax: true,
                tax_type_id: Some(tax_type.id),
            },
        )
        .expect("tax type was just created");

    tracing::info!(
        property = %property.id,
        channel = %channel.id,
        confirmed = %catalog.confirmed,
        cancelled = %catalog.cancelled,
        standard = %catalog.standard,
        closed_period = %catalog.closed_period,
        income = %catalog.income,
        expense = %catalog.expense,
        completed = %catalog.completed,
        "seeded demo data for tenant 1"
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let policy = BookingPolicy {
        min_check_in: args
            .no_past_bookings
            .then(|| chrono::Local::now().date_naive()),
    };
    let engine = Arc::new(Engine::with_policy(policy));

    if args.seed_demo {
        seed_demo(&engine);
    }

    let state = AppState { engine };
    let app = router(state);

    let listener = match TcpListener::bind(&args.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error binding {}: {}", args.bind, e);
            process::exit(1);
        }
    };
    tracing::info!(bind = %args.bind, "rental ledger API listening");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
