use chrono::NaiveDate;
use std::{fs, path::Path};

use crate::error::{CostEngineerError, Result};
use crate::structured::OrderList;

const HEADER: [&str; 7] = [
    "Supplier",
    "Description",
    "Product Code",
    "Quantity",
    "Unit",
    "Unit Price",
    "Total",
];

pub fn order_list_csv(order_list: &OrderList) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for supplier in &order_list.suppliers {
        for item in &supplier.items {
            let quantity = format_quantity(item.quantity);
            let unit_price = format!("{:.2}", item.unit_price);
            let total = format!("{:.2}", item.total);
            writer.write_record([
                supplier.supplier.as_str(),
                item.description.as_str(),
                item.product_code.as_deref().unwrap_or(""),
                quantity.as_str(),
                item.unit.as_str(),
                unit_price.as_str(),
                total.as_str(),
            ])?;
        }
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CostEngineerError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| CostEngineerError::Storage(e.to_string()))
}

pub fn default_export_file_name(date: NaiveDate) -> String {
    format!("order-list-{}.csv", date.format("%Y-%m-%d"))
}

pub fn write_order_list(path: &Path, order_list: &OrderList) -> Result<()> {
    let csv = order_list_csv(order_list)?;
    fs::write(path, csv)?;
    tracing::info!(path = %path.display(), items = order_list.item_count(), "exported order list");
    Ok(())
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{quantity:.0}")
    } else {
        format!("{quantity}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::{OrderItem, SupplierOrder};
    use pretty_assertions::assert_eq;

    fn sample() -> OrderList {
        OrderList {
            suppliers: vec![
                SupplierOrder {
                    supplier: "CEF".to_string(),
                    items: vec![OrderItem {
                        description: "32A RCBO, Type A".to_string(),
                        product_code: Some("RCBO-32A".to_string()),
                        quantity: 6.0,
                        unit: "each".to_string(),
                        unit_price: 24.0,
                        total: 144.0,
                    }],
                    subtotal: 144.0,
                },
                SupplierOrder {
                    supplier: "Screwfix".to_string(),
                    items: vec![OrderItem {
                        description: "Twin & earth".to_string(),
                        product_code: None,
                        quantity: 1.5,
                        unit: "drum".to_string(),
                        unit_price: 68.0,
                        total: 102.0,
                    }],
                    subtotal: 102.0,
                },
            ],
        }
    }

    #[test]
    fn csv_has_header_and_quoted_fields() {
        let csv = order_list_csv(&sample()).expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Supplier,Description,Product Code,Quantity,Unit,Unit Price,Total",
                "CEF,\"32A RCBO, Type A\",RCBO-32A,6,each,24.00,144.00",
                "Screwfix,Twin & earth,,1.5,drum,68.00,102.00",
            ]
        );
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).expect("date");
        assert_eq!(default_export_file_name(date), "order-list-2026-03-09.csv");
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("orders.csv");
        write_order_list(&path, &sample()).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("Supplier,"));
    }
}
