#![allow(dead_code)]

use tabviz::{Catalog, Column, ColumnKind, Row, Value};

pub const SALES_CSV: &str = "\
order_date,product,category,total,city,payment_method,rating
2024-01-05,Widget,Tools,120.50,Boston,card,4
2024-01-19,Gadget,Toys,80,Denver,cash,5
2024-02-02,Widget,Tools,99.5,Boston,card,3
2024-02-14,Doohickey,Garden,,Austin,card,
2024-03-01,Gadget,Toys,150,Denver,paypal,4
";

pub fn row(cells: &[(&str, Value)]) -> Row {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Rows of `cat`/`amt` text cells, as a client would send them.
pub fn text_rows(cells: &[(&str, &str)]) -> Vec<Row> {
    cells
        .iter()
        .map(|(cat, amt)| row(&[("cat", Value::from(*cat)), ("amt", Value::from(*amt))]))
        .collect()
}

pub fn cat_amt_catalog() -> Catalog {
    Catalog::new(vec![
        Column::new("cat", ColumnKind::Categorical),
        Column::new("amt", ColumnKind::Numeric),
    ])
}
