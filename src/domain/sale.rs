use super::cart::Cart;
use super::payment::{PaymentMethod, PaymentStatus};
use super::product::{Price, ProductId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque sale identifier returned by the backend on sale creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub String);

impl SaleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the store the terminal sells for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One item of the sale batch sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

/// The full request handed to the backend's transactional sale creation.
///
/// The backend is required to apply this atomically: sale row, item batch
/// and stock decrement all commit or none do. The client never compensates
/// for partial success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRequest {
    pub store_id: StoreId,
    pub total: Price,
    pub items: Vec<SaleItem>,
    pub payment_method: PaymentMethod,
}

impl SaleRequest {
    /// Builds the item batch and total from the current cart.
    pub fn from_cart(store_id: StoreId, cart: &Cart, method: PaymentMethod) -> Self {
        let items = cart
            .lines()
            .map(|line| SaleItem {
                product_id: line.product.id.clone(),
                product_name: line.product.name.clone(),
                quantity: line.quantity,
                unit_price: line.product.price,
                line_total: line.line_total(),
            })
            .collect();

        Self {
            store_id,
            total: cart.total(),
            items,
            payment_method: method,
        }
    }
}

/// What the backend returns for a created sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: SaleId,
    pub status: PaymentStatus,
}

/// A past sale row, as listed on the sales-history screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    pub total: Price,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: String,
}

/// Dashboard aggregates for the current store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub sales_today: u32,
    pub revenue_today: Price,
}
