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

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rental_ledger_rs::{
    BookingId, CatalogDefaults, ConfigCategory, Engine, NewBooking, NewChannel, NewConfigValue,
    NewMovement, PersonId, PropertyId, TenantContext, TenantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Treasury Reconciler - Derive per-booking payment figures from CSV files
///
/// Reads a bookings CSV and a movements CSV and outputs one summary row per
/// booking with its total, net, paid and pending amounts.
#[derive(Parser, Debug)]
#[command(name = "rental-ledger-reconcile")]
#[command(about = "Reconciles booking payments from CSV files", long_about = None)]
struct Args {
    /// Path to CSV file with bookings
    ///
    /// Expected format:
    /// booking,tenant,property,check_in,check_out,guests,total,sales_pct,collection_pct,tax_pct
    #[arg(value_name = "BOOKINGS")]
    bookings: PathBuf,

    /// Path to CSV file with movements
    ///
    /// Expected format: booking,type,status,amount,date
    #[arg(value_name = "MOVEMENTS")]
    movements: PathBuf,
}

fn main() {
    let args = Args::parse();

    let bookings = match File::open(&args.bookings) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.bookings.display(), e);
            process::exit(1);
        }
    };
    let movements = match File::open(&args.movements) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.movements.display(), e);
            process::exit(1);
        }
    };

    let importer = match import(BufReader::new(bookings), BufReader::new(movements)) {
        Ok(importer) => importer,
        Err(e) => {
            eprintln!("Error processing CSV input: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_summary(&importer, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw bookings CSV record.
///
/// The commission columns are optional; a row with any of them creates a
/// one-off channel carrying those rates.
#[derive(Debug, Deserialize)]
struct BookingRecord {
    booking: u64,
    tenant: u64,
    property: u64,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: u32,
    total: Decimal,
    #[serde(deserialize_with = "csv::invalid_option")]
    sales_pct: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option")]
    collection_pct: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option")]
    tax_pct: Option<Decimal>,
}

/// Raw movements CSV record. `booking` must match a bookings-file row.
#[derive(Debug, Deserialize)]
struct MovementRecord {
    booking: u64,
    #[serde(rename = "type")]
    movement_type: String,
    status: String,
    amount: Decimal,
    date: NaiveDate,
}

/// Summary CSV row, one per imported booking.
#[derive(Debug, Serialize)]
struct SummaryRecord {
    booking: u64,
    total: Decimal,
    net: Decimal,
    paid: Decimal,
    pending: Decimal,
}

/// Engine plus the external-reference maps built during import.
pub struct Importer {
    engine: Engine,
    tenants: BTreeMap<u64, (TenantContext, CatalogDefaults)>,
    properties: BTreeMap<(u64, u64), PropertyId>,
    bookings: BTreeMap<u64, (TenantContext, BookingId)>,
}

impl Importer {
    fn new() -> Self {
        Self {
            engine: Engine::new(),
            tenants: BTreeMap::new(),
            properties: BTreeMap::new(),
            bookings: BTreeMap::new(),
        }
    }

    fn tenant(&mut self, tenant: u64) -> (TenantContext, CatalogDefaults) {
        if let Some(entry) = self.tenants.get(&tenant) {
            return *entry;
        }
        let ctx = TenantContext::new(TenantId(tenant));
        let defaults = self.engine.seed_default_catalog(ctx);
        self.tenants.insert(tenant, (ctx, defaults));
        (ctx, defaults)
    }

    fn property(&mut self, ctx: TenantContext, tenant: u64, property: u64) -> PropertyId {
        if let Some(id) = self.properties.get(&(tenant, property)) {
            return *id;
        }
        let id = self
            .engine
            .add_property(ctx, &format!("property-{property}"))
            .id;
        self.properties.insert((tenant, property), id);
        id
    }

    fn ingest_booking(&mut self, record: BookingRecord) {
        let (ctx, defaults) = self.tenant(record.tenant);
        let property_id = self.property(ctx, record.tenant, record.property);

        let has_rates = record.sales_pct.is_some()
            || record.collection_pct.is_some()
            || record.tax_pct.is_some();
        let channel_id = has_rates.then(|| {
            let tax_type_id = record.tax_pct.map(|pct| {
                self.engine
                    .add_config_value(
                        ctx,
                        NewConfigValue::new(ConfigCategory::TaxType, "vat", "VAT")
                            .with_description(&pct.to_string()),
                    )
                    .id
            });
            self.engine
                .add_channel(
                    ctx,
                    NewChannel {
                        name: format!("import-{}", record.booking),
                        sales_commission: record.sales_pct.unwrap_or(Decimal::ZERO),
                        collection_commission: record.collection_pct.unwrap_or(Decimal::ZERO),
                        apply_tax: record.tax_pct.is_some(),
                        tax_type_id,
                    },
                )
                .expect("tax type was just created")
                .id
        });

        let result = self.engine.create_booking(
            ctx,
            NewBooking {
                property_id,
                person_id: Some(PersonId(record.booking)),
                channel_id,
                check_in_date: record.check_in,
                check_out_date: record.check_out,
                guests: record.guests,
                total_amount: record.total,
                status_id: defaults.confirmed,
                type_id: defaults.standard,
            },
        );
        match result {
            Ok(booking) => {
                self.bookings.insert(record.booking, (ctx, booking.id));
            }
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping booking {}: {}", record.booking, e);
            }
        }
    }

    fn ingest_movement(&mut self, record: MovementRecord) {
        let Some(&(ctx, booking_id)) = self.bookings.get(&record.booking) else {
            #[cfg(debug_assertions)]
            eprintln!("Skipping movement for unknown booking {}", record.booking);
            return;
        };
        let defaults = self.tenants[&ctx.tenant_id().0].1;

        let type_id = match record.movement_type.to_lowercase().as_str() {
            "income" | "ingreso" => defaults.income,
            "expense" | "gasto" => defaults.expense,
            _ => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping movement with unknown type {}", record.movement_type);
                return;
            }
        };
        let status_id = match record.status.to_lowercase().as_str() {
            "completed" | "paid" => defaults.completed,
            "pending" => defaults.pending_payment,
            "failed" => defaults.failed,
            _ => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping movement with unknown status {}", record.status);
                return;
            }
        };

        if let Err(e) = self.engine.create_movement(
            ctx,
            NewMovement {
                type_id,
                status_id,
                amount: record.amount,
                movement_date: record.date,
                booking_id: Some(booking_id),
                service_provider_id: None,
                notes: None,
            },
        ) {
            #[cfg(debug_assertions)]
            eprintln!("Skipping movement for booking {}: {}", record.booking, e);
        }
    }
}

/// Builds an engine from the two CSV readers.
///
/// Malformed rows, rows referencing unknown bookings, and bookings that
/// conflict with an already-imported range are skipped; skipping is reported
/// in debug builds only, matching how the nightly import job runs.
pub fn import<R: Read>(bookings: R, movements: R) -> Result<Importer, csv::Error> {
    let mut importer = Importer::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(bookings);
    for result in rdr.deserialize::<BookingRecord>() {
        match result {
            Ok(record) => importer.ingest_booking(record),
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed booking row: {}", e);
            }
        }
    }

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(movements);
    for result in rdr.deserialize::<MovementRecord>() {
        match result {
            Ok(record) => importer.ingest_movement(record),
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed movement row: {}", e);
            }
        }
    }

    Ok(importer)
}

/// Writes one summary row per imported booking, in booking-reference order.
pub fn write_summary<W: Write>(importer: &Importer, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for (reference, (ctx, booking_id)) in &importer.bookings {
        let Ok(booking) = importer.engine.get_booking(*ctx, *booking_id) else {
            continue;
        };
        let Ok(financials) = importer.engine.recompute_booking_paid(*ctx, *booking_id) else {
            continue;
        };
        wtr.serialize(SummaryRecord {
            booking: *reference,
            total: booking.total_amount,
            net: booking.net_amount,
            paid: financials.paid_amount,
            pending: financials.pending_amount,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    const BOOKINGS_HEADER: &str =
        "booking,tenant,property,check_in,check_out,guests,total,sales_pct,collection_pct,tax_pct\n";
    const MOVEMENTS_HEADER: &str = "booking,type,status,amount,date\n";

    #[test]
    fn import_direct_booking_with_payments() {
        let bookings = format!(
            "{BOOKINGS_HEADER}101,1,7,2025-06-01,2025-06-05,2,1000,,,\n"
        );
        let movements = format!(
            "{MOVEMENTS_HEADER}101,income,completed,300,2025-06-01\n\
             101,income,completed,310,2025-06-02\n"
        );

        let importer = import(Cursor::new(bookings), Cursor::new(movements)).unwrap();

        let (ctx, booking_id) = importer.bookings[&101];
        let financials = importer.engine.recompute_booking_paid(ctx, booking_id).unwrap();
        assert_eq!(financials.paid_amount, dec!(610));
        assert_eq!(financials.pending_amount, dec!(390));
    }

    #[test]
    fn import_channel_booking_reconciles_against_net() {
        let bookings = format!(
            "{BOOKINGS_HEADER}101,1,7,2025-06-01,2025-06-05,2,1000,15,3,21\n"
        );
        let movements = format!(
            "{MOVEMENTS_HEADER}101,income,completed,300,2025-06-01\n\
             101,income,completed,310,2025-06-02\n"
        );

        let importer = import(Cursor::new(bookings), Cursor::new(movements)).unwrap();

        let (ctx, booking_id) = importer.bookings[&101];
        let booking = importer.engine.get_booking(ctx, booking_id).unwrap();
        assert_eq!(booking.net_amount, dec!(610));

        let financials = importer.engine.recompute_booking_paid(ctx, booking_id).unwrap();
        assert_eq!(financials.paid_amount, dec!(610));
        assert_eq!(financials.pending_amount, dec!(0));
    }

    #[test]
    fn overlapping_booking_rows_are_skipped() {
        let bookings = format!(
            "{BOOKINGS_HEADER}\
             101,1,7,2025-06-01,2025-06-05,2,1000,,,\n\
             102,1,7,2025-06-04,2025-06-08,2,500,,,\n\
             103,1,7,2025-06-05,2025-06-08,2,500,,,\n"
        );

        let importer = import(Cursor::new(bookings), Cursor::new(String::new())).unwrap();

        // 102 overlaps 101 on June 4 and is dropped; 103 is back-to-back.
        assert!(importer.bookings.contains_key(&101));
        assert!(!importer.bookings.contains_key(&102));
        assert!(importer.bookings.contains_key(&103));
    }

    #[test]
    fn pending_and_failed_movements_do_not_pay() {
        let bookings = format!(
            "{BOOKINGS_HEADER}101,1,7,2025-06-01,2025-06-05,2,1000,,,\n"
        );
        let movements = format!(
            "{MOVEMENTS_HEADER}\
             101,income,completed,100,2025-06-01\n\
             101,income,pending,500,2025-06-01\n\
             101,income,failed,500,2025-06-01\n"
        );

        let importer = import(Cursor::new(bookings), Cursor::new(movements)).unwrap();

        let (ctx, booking_id) = importer.bookings[&101];
        let financials = importer.engine.recompute_booking_paid(ctx, booking_id).unwrap();
        assert_eq!(financials.paid_amount, dec!(100));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let bookings = format!(
            "{BOOKINGS_HEADER}\
             101,1,7,2025-06-01,2025-06-05,2,1000,,,\n\
             nonsense,row,here,x,y,z,w,,,\n\
             102,1,8,2025-06-01,2025-06-05,2,800,,,\n"
        );

        let importer = import(Cursor::new(bookings), Cursor::new(String::new())).unwrap();
        assert_eq!(importer.bookings.len(), 2);
    }

    #[test]
    fn summary_lists_bookings_in_reference_order() {
        let bookings = format!(
            "{BOOKINGS_HEADER}\
             202,1,8,2025-06-01,2025-06-05,2,800,,,\n\
             101,1,7,2025-06-01,2025-06-05,2,1000,,,\n"
        );
        let movements = format!("{MOVEMENTS_HEADER}101,income,completed,1000,2025-06-01\n");

        let importer = import(Cursor::new(bookings), Cursor::new(movements)).unwrap();

        let mut output = Vec::new();
        write_summary(&importer, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        let mut lines = output.lines();
        assert_eq!(lines.next().unwrap(), "booking,total,net,paid,pending");
        assert!(lines.next().unwrap().starts_with("101,1000,1000,1000,0"));
        assert!(lines.next().unwrap().starts_with("202,800,800,0,800"));
    }

    #[test]
    fn movements_for_unknown_bookings_are_ignored() {
        let bookings = format!(
            "{BOOKINGS_HEADER}101,1,7,2025-06-01,2025-06-05,2,1000,,,\n"
        );
        let movements = format!("{MOVEMENTS_HEADER}999,income,completed,300,2025-06-01\n");

        let importer = import(Cursor::new(bookings), Cursor::new(movements)).unwrap();

        let (ctx, booking_id) = importer.bookings[&101];
        let financials = importer.engine.recompute_booking_paid(ctx, booking_id).unwrap();
        assert_eq!(financials.paid_amount, dec!(0));
    }
}
