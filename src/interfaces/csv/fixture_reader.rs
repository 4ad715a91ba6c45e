use crate::domain::money::Amount;
use crate::domain::order::{Order, OrderId, OrderItem, UserId};
use crate::domain::product::Product;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct ProductRow {
    product: u64,
    name: String,
    price: Decimal,
    stock: u32,
}

/// Reads catalog products from a CSV source
/// (`product, name, price, stock`).
pub struct ProductReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ProductReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates products.
    pub fn products(self) -> impl Iterator<Item = Result<Product>> {
        self.reader.into_deserialize().map(|result| {
            let row: ProductRow = result?;
            let price = Amount::new(row.price)?;
            Ok(Product {
                id: row.product,
                name: row.name,
                price,
                stock_quantity: row.stock,
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct OrderItemRow {
    order: u64,
    user: u64,
    product: u64,
    quantity: u32,
    unit_price: Decimal,
}

/// Reads orders from a CSV source with one line item per record
/// (`order, user, product, quantity, unit_price`).
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Groups the line items by order id and builds pending orders with
    /// computed totals. The first row of an order supplies its user.
    pub fn orders(self) -> Result<Vec<Order>> {
        let mut grouped: BTreeMap<OrderId, (UserId, Vec<OrderItem>)> = BTreeMap::new();
        for result in self.reader.into_deserialize() {
            let row: OrderItemRow = result?;
            let unit_price = Amount::new(row.unit_price)?;
            let entry = grouped.entry(row.order).or_insert((row.user, Vec::new()));
            entry.1.push(OrderItem {
                product: row.product,
                quantity: row.quantity,
                unit_price,
            });
        }
        grouped
            .into_iter()
            .map(|(id, (user, items))| Order::new(id, user, items))
            .collect()
    }
}
