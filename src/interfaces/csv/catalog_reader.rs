use crate::domain::product::{Price, Product, ProductId};
use crate::error::{PdvError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    id: String,
    name: String,
    price: Decimal,
    stock: u32,
}

/// Reads a product catalog from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming, yielding an iterator of
/// `Result<Product>` so malformed rows surface individually instead of
/// aborting the whole load.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn products(self) -> impl Iterator<Item = Result<Product>> {
        self.reader
            .into_deserialize()
            .map(|record: std::result::Result<CatalogRecord, csv::Error>| {
                let record = record.map_err(PdvError::from)?;
                Ok(Product {
                    id: ProductId::new(record.id),
                    name: record.name,
                    price: Price::new(record.price)?,
                    stock: record.stock,
                })
            })
    }
}
