use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use time::macros::format_description;
use time::{Date, Duration};

use crate::error::ContextError;
use crate::invoice::{round_to_cents, Invoice, Order, Product};
use crate::renderer::{today, InvoiceRenderer};

const NAMES_FILE_NAME: &str = "names.csv";

/// The products a generated order can draw from.
pub const PRODUCT_NAME_POOL: [&str; 6] = ["Milk", "Eggs", "Bread", "Cheese", "Butter", "Coffee"];

/// The customers used when no name pool file is available.
const FALLBACK_CUSTOMER_NAMES: [&str; 12] = [
    "Ada Lovelace",
    "Alan Turing",
    "Edsger Dijkstra",
    "Grace Hopper",
    "Donald Knuth",
    "Barbara Liskov",
    "John Backus",
    "Frances Allen",
    "Tony Hoare",
    "Margaret Hamilton",
    "Dennis Ritchie",
    "Radia Perlman",
];

/// Reads the customer name pool from `names.csv` in the data directory, one
/// record per customer with the fields joined by spaces. Without the file the
/// built-in pool is used instead.
pub fn load_customer_names(data_directory: &Path) -> Result<Vec<String>, ContextError> {
    let names_path = data_directory.join(NAMES_FILE_NAME);
    if !names_path.exists() {
        log::debug!("No name pool at {:?}, using the built-in one", names_path);
        return Ok(FALLBACK_CUSTOMER_NAMES
            .iter()
            .map(|name| name.to_string())
            .collect());
    }

    let mut names_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(&names_path)
        .map_err(|error| {
            ContextError::with_error(
                format!("Failed to open the name pool {:?}", names_path),
                &error,
            )
        })?;

    let mut customer_names = Vec::new();
    for record in names_reader.records() {
        let record = record.map_err(|error| {
            ContextError::with_error(
                format!("Failed to read the name pool {:?}", names_path),
                &error,
            )
        })?;
        let customer_name = record.iter().collect::<Vec<&str>>().join(" ");
        let customer_name = customer_name.trim();
        if !customer_name.is_empty() {
            customer_names.push(customer_name.to_string());
        }
    }

    if customer_names.is_empty() {
        return Err(ContextError::with_context(format!(
            "The name pool {:?} contains no names",
            names_path
        )));
    }
    Ok(customer_names)
}

/// Generates synthetic invoices from a seeded generator, so that the same
/// seed and name pool give the same invoices within a day. Customers are
/// sampled without replacement; each invoice gets a handful of products with
/// prices between one and five, and orders with whole quantities up to ten
/// placed within the last two weeks. The orders are sorted by date and the
/// invoice is dated at its newest order.
pub fn generate_invoices(
    invoice_count: usize,
    seed: u64,
    customer_names: &[String],
) -> Result<Vec<Invoice>, ContextError> {
    if invoice_count > customer_names.len() {
        return Err(ContextError::with_context(format!(
            "Cannot generate {} invoices from a pool of {} customers",
            invoice_count,
            customer_names.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampled_names = customer_names.to_vec();
    sampled_names.shuffle(&mut rng);
    sampled_names.truncate(invoice_count);

    let order_dates = date_range(2);
    let invoices = sampled_names
        .into_iter()
        .map(|customer_name| {
            let products: Vec<Arc<Product>> = (0..rng.gen_range(1..=5))
                .map(|_| {
                    let product_name = PRODUCT_NAME_POOL[rng.gen_range(0..PRODUCT_NAME_POOL.len())];
                    let price = round_to_cents(rng.gen_range(1.0..=5.0));
                    Arc::new(Product::new(product_name, price))
                })
                .collect();

            let mut orders: Vec<Order> = (0..rng.gen_range(1..=5))
                .map(|_| {
                    let order_date = order_dates[rng.gen_range(0..order_dates.len())];
                    let product = Arc::clone(&products[rng.gen_range(0..products.len())]);
                    let quantity = rng.gen_range(1..=10) as f64;
                    Order::new(customer_name.clone(), quantity, order_date, product)
                })
                .collect();
            orders.sort_by_key(|order| order.order_date);

            let invoice_date = orders
                .iter()
                .map(|order| order.order_date)
                .max()
                .unwrap_or(order_dates[0]);
            Invoice::new(customer_name, invoice_date, orders)
        })
        .collect();
    Ok(invoices)
}

/// The last `weeks` times seven days ending today, newest first.
pub fn date_range(weeks: u32) -> Vec<Date> {
    let base_date = today();
    (0..i64::from(weeks) * 7)
        .map(|day_offset| base_date - Duration::days(day_offset))
        .collect()
}

/// Renders every invoice in order, stopping at the first failure.
pub fn render_batch(
    renderer: &InvoiceRenderer,
    invoices: &[Invoice],
) -> Result<Vec<PathBuf>, ContextError> {
    let mut output_paths = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let output_path = renderer.render_to_file(invoice)?;
        log::info!("Rendered the invoice for {}", invoice.name);
        output_paths.push(output_path);
    }
    Ok(output_paths)
}

/// Renders the invoices on the rayon worker pool. Unlike the sequential
/// driver every invoice is attempted, and the failures are surfaced together
/// in one error naming the affected customers.
pub fn render_batch_parallel(
    renderer: &InvoiceRenderer,
    invoices: &[Invoice],
) -> Result<Vec<PathBuf>, ContextError> {
    let render_results: Vec<Result<PathBuf, ContextError>> = invoices
        .par_iter()
        .map(|invoice| {
            let output_path = renderer.render_to_file(invoice)?;
            log::info!("Rendered the invoice for {}", invoice.name);
            Ok(output_path)
        })
        .collect();

    let mut output_paths = Vec::with_capacity(invoices.len());
    let mut failed_customers = Vec::new();
    for (invoice, render_result) in invoices.iter().zip(render_results) {
        match render_result {
            Ok(output_path) => output_paths.push(output_path),
            Err(error) => {
                log::error!("{}", error);
                failed_customers.push(invoice.name.as_str());
            }
        }
    }

    if failed_customers.is_empty() {
        Ok(output_paths)
    } else {
        Err(ContextError::with_context(format!(
            "Failed to render the invoices for {}",
            failed_customers.join(", ")
        )))
    }
}

/// Writes the invoices to a fixture file as indented JSON.
pub fn save_invoices(invoices: &[Invoice], fixture_path: &Path) -> Result<(), ContextError> {
    let mut content_buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut content_buffer, formatter);
    invoices.serialize(&mut serializer).map_err(|error| {
        ContextError::with_error("Failed to serialize the invoices", &error)
    })?;

    let mut fixture_file = std::fs::File::create(fixture_path).map_err(|error| {
        ContextError::with_error(
            format!("Failed to create the fixture {:?}", fixture_path),
            &error,
        )
    })?;
    fixture_file.write_all(&content_buffer).map_err(|error| {
        ContextError::with_error(
            format!("Failed to write the fixture {:?}", fixture_path),
            &error,
        )
    })?;

    Ok(())
}

/// Reads invoices back from a fixture file written by [`save_invoices`].
pub fn load_invoices(fixture_path: &Path) -> Result<Vec<Invoice>, ContextError> {
    let fixture_content = std::fs::read(fixture_path).map_err(|error| {
        ContextError::with_error(
            format!("Failed to read the fixture {:?}", fixture_path),
            &error,
        )
    })?;
    serde_json::from_slice(&fixture_content).map_err(|error| {
        ContextError::with_error(
            format!("Failed to parse the fixture {:?}", fixture_path),
            &error,
        )
    })
}

/// The conventional fixture name for a batch of the given size, dated today.
pub fn fixture_file_name(invoice_count: usize) -> Result<String, ContextError> {
    let formatted_date = today()
        .format(format_description!("[day]_[month]_[year]"))
        .map_err(|error| ContextError::with_error("Failed to format today's date", &error))?;
    Ok(format!("{}_invoices_{}.json", invoice_count, formatted_date))
}

/// Removes every PDF file from the output directory and returns how many were
/// removed. A directory that does not exist counts as already empty.
pub fn delete_all_invoices(output_directory: &Path) -> Result<usize, ContextError> {
    if !output_directory.exists() {
        return Ok(0);
    }

    let directory_entries = std::fs::read_dir(output_directory).map_err(|error| {
        ContextError::with_error(
            format!("Failed to list the directory {:?}", output_directory),
            &error,
        )
    })?;

    let mut removed_count = 0;
    for directory_entry in directory_entries {
        let entry_path = directory_entry
            .map_err(|error| {
                ContextError::with_error(
                    format!("Failed to list the directory {:?}", output_directory),
                    &error,
                )
            })?
            .path();
        if entry_path.extension().map_or(false, |extension| extension == "pdf") {
            std::fs::remove_file(&entry_path).map_err(|error| {
                ContextError::with_error(
                    format!("Failed to remove the invoice {:?}", entry_path),
                    &error,
                )
            })?;
            removed_count += 1;
        }
    }

    log::debug!(
        "Removed {} invoices from {:?}",
        removed_count,
        output_directory
    );
    Ok(removed_count)
}
