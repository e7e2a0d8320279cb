use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

/// Rounds a monetary amount to whole cents, with halves rounding away from
/// zero. Order costs pass through this function exactly once, when the order
/// is created, so downstream arithmetic never compounds rounding artifacts.
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Formats a quantity the way it would be written by hand: whole numbers drop
/// the decimal point, half units keep one decimal, anything finer keeps two.
pub fn format_quantity(quantity: f64) -> String {
    if quantity == quantity.trunc() {
        format!("{:.0}", quantity)
    } else if quantity * 2.0 == (quantity * 2.0).trunc() {
        format!("{:.1}", quantity)
    } else {
        format!("{:.2}", quantity)
    }
}

/// A catalog item: a name with a unit price. The price is stored exactly as
/// given; whoever creates a product decides how precise it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: f64,
}

impl Product {
    pub fn new<S: Into<String>>(name: S, price: f64) -> Product {
        Product {
            name: name.into(),
            price,
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} {}", self.name, self.price)
    }
}

/// A single purchase of a product. The cost is evaluated and rounded to whole
/// cents when the order is created and never recomputed afterwards, so a later
/// change to the quantity or the catalog price cannot silently alter an order
/// that was already placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// The name of the person the order is billed to.
    pub name: String,
    pub quantity: f64,
    pub order_date: Date,
    pub product: Arc<Product>,
    pub cost: f64,
}

impl Order {
    pub fn new<S: Into<String>>(
        name: S,
        quantity: f64,
        order_date: Date,
        product: Arc<Product>,
    ) -> Order {
        let cost = round_to_cents(quantity * product.price);
        Order {
            name: name.into(),
            quantity,
            order_date,
            product,
            cost,
        }
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let order_date = self
            .order_date
            .format(format_description!("[day]/[month]/[year]"))
            .map_err(|_| std::fmt::Error)?;
        write!(
            formatter,
            " {:<10} {:<10} {:<10} {:<15}",
            self.product.name,
            format_quantity(self.quantity),
            format!("{:.2}", self.cost),
            order_date,
        )
    }
}

/// A customer's invoice: a name, an issue date and the orders in the order
/// they were added, which is also the order they render in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub name: String,
    pub date: Date,
    pub orders: Vec<Order>,
}

impl Invoice {
    pub fn new<S: Into<String>>(name: S, date: Date, orders: Vec<Order>) -> Invoice {
        Invoice {
            name: name.into(),
            date,
            orders,
        }
    }

    /// Appends an order to the invoice.
    pub fn add_order(&mut self, order: Order) {
        self.orders.push(order);
    }

    /// The balance due: the sum of quantity times unit price over all orders.
    /// The sum is kept exact here, it is only rounded where it gets formatted
    /// for the page.
    pub fn balance(&self) -> f64 {
        self.orders
            .iter()
            .map(|order| order.quantity * order.product.price)
            .sum()
    }
}

impl std::fmt::Display for Invoice {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let date = self
            .date
            .format(format_description!("[day]/[month]/[year]"))
            .map_err(|_| std::fmt::Error)?;
        writeln!(formatter, "{}\t{}", self.name, date)?;
        writeln!(formatter, "{}", "-".repeat(40))?;
        writeln!(
            formatter,
            " {:<10} {:<10} {:<10} {:<15} ",
            "Product", "Quantity", "Cost", "Date",
        )?;
        for order in &self.orders {
            writeln!(formatter, "{}", order)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use time::macros::date;

    use super::*;

    #[test]
    fn order_costs_are_rounded_to_cents() {
        let product = Arc::new(Product::new("Milk", 1.257));
        let order = Order::new("Margaret", 2.0, date!(2024 - 03 - 11), product);
        assert_eq!(order.cost, 2.51);
    }

    #[test]
    fn order_costs_are_frozen_when_the_order_is_placed() {
        let product = Arc::new(Product::new("Coffee", 4.99));
        let mut order = Order::new("Margaret", 3.0, date!(2024 - 03 - 11), product);
        assert_eq!(order.cost, 14.97);

        order.quantity = 5.0;
        assert_eq!(order.cost, 14.97);
    }

    #[test]
    fn quantities_are_formatted_with_the_fewest_meaningful_decimals() {
        assert_eq!(format_quantity(3.0), "3");
        assert_eq!(format_quantity(2.5), "2.5");
        assert_eq!(format_quantity(1.25), "1.25");
        assert_eq!(format_quantity(1.33), "1.33");
        assert_eq!(format_quantity(0.75), "0.75");
    }

    #[test]
    fn added_orders_keep_their_insertion_order() {
        let product = Arc::new(Product::new("Bread", 2.0));
        let mut invoice = Invoice::new("Harold", date!(2024 - 03 - 14), Vec::new());
        invoice.add_order(Order::new(
            "Harold",
            1.0,
            date!(2024 - 03 - 14),
            Arc::clone(&product),
        ));
        invoice.add_order(Order::new(
            "Harold",
            2.0,
            date!(2024 - 03 - 02),
            Arc::clone(&product),
        ));
        invoice.add_order(Order::new(
            "Harold",
            4.0,
            date!(2024 - 03 - 09),
            Arc::clone(&product),
        ));

        let order_dates: Vec<Date> = invoice
            .orders
            .iter()
            .map(|order| order.order_date)
            .collect();
        assert_eq!(
            order_dates,
            vec![
                date!(2024 - 03 - 14),
                date!(2024 - 03 - 02),
                date!(2024 - 03 - 09)
            ]
        );
    }

    #[test]
    fn the_balance_recomputes_from_quantities_and_prices() {
        let milk = Arc::new(Product::new("Milk", 1.15));
        let eggs = Arc::new(Product::new("Eggs", 3.4));
        let invoice = Invoice::new(
            "Doreen",
            date!(2024 - 03 - 06),
            vec![
                Order::new("Doreen", 2.0, date!(2024 - 03 - 04), Arc::clone(&milk)),
                Order::new("Doreen", 1.5, date!(2024 - 03 - 06), Arc::clone(&eggs)),
            ],
        );
        assert_eq!(format!("{:.2}", invoice.balance()), "7.40");
    }

    #[test]
    fn orders_and_invoices_render_as_aligned_plain_text() {
        let product = Arc::new(Product::new("Cheese", 3.75));
        let invoice = Invoice::new(
            "Stanley",
            date!(2024 - 03 - 08),
            vec![Order::new(
                "Stanley",
                2.0,
                date!(2024 - 03 - 08),
                Arc::clone(&product),
            )],
        );

        let rendered = invoice.to_string();
        let mut expected = String::new();
        expected.push_str("Stanley\t08/03/2024\n");
        expected.push_str(&"-".repeat(40));
        expected.push('\n');
        expected.push_str(" Product    Quantity   Cost       Date            \n");
        expected.push_str(" Cheese     2          7.50       08/03/2024     \n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn orders_round_trip_through_json() {
        let product = Arc::new(Product::new("Butter", 2.3));
        let order = Order::new("Agnes", 0.5, date!(2024 - 03 - 10), Arc::clone(&product));
        let serialized = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&serialized).unwrap();
        assert_eq!(order, deserialized);
    }
}
