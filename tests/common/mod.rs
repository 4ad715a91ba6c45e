use std::path::Path;

pub fn write_products_csv(path: &Path, rows: &[(u64, &str, &str, u32)]) {
    let mut wtr = csv::Writer::from_path(path).unwrap();
    wtr.write_record(["product", "name", "price", "stock"])
        .unwrap();
    for (id, name, price, stock) in rows {
        wtr.write_record([
            id.to_string(),
            name.to_string(),
            price.to_string(),
            stock.to_string(),
        ])
        .unwrap();
    }
    wtr.flush().unwrap();
}

pub fn write_orders_csv(path: &Path, rows: &[(u64, u64, u64, u32, &str)]) {
    let mut wtr = csv::Writer::from_path(path).unwrap();
    wtr.write_record(["order", "user", "product", "quantity", "unit_price"])
        .unwrap();
    for (order, user, product, quantity, unit_price) in rows {
        wtr.write_record([
            order.to_string(),
            user.to_string(),
            product.to_string(),
            quantity.to_string(),
            unit_price.to_string(),
        ])
        .unwrap();
    }
    wtr.flush().unwrap();
}

pub fn write_attempts_csv(path: &Path, rows: &[(u64, &str, &str, &str, &str)]) {
    let mut wtr = csv::Writer::from_path(path).unwrap();
    wtr.write_record(["order", "cardholder", "number", "expiry", "cvv"])
        .unwrap();
    for (order, cardholder, number, expiry, cvv) in rows {
        wtr.write_record([
            order.to_string(),
            cardholder.to_string(),
            number.to_string(),
            expiry.to_string(),
            cvv.to_string(),
        ])
        .unwrap();
    }
    wtr.flush().unwrap();
}
