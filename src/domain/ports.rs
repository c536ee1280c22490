use super::payment::PaymentStatus;
use super::product::Product;
use super::sale::{DashboardMetrics, SaleId, SaleRecord, SaleReceipt, SaleRequest, StoreId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// The authenticated user, as returned by the backend's auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// Push-style feed of payment-status changes for one sale.
///
/// Backed by a bounded channel; dropping the feed tears the subscription
/// down on the backend side (the sender observes the closed channel).
#[derive(Debug)]
pub struct PaymentFeed {
    rx: mpsc::Receiver<PaymentStatus>,
}

impl PaymentFeed {
    pub fn new(rx: mpsc::Receiver<PaymentStatus>) -> Self {
        Self { rx }
    }

    /// Next status change; `None` once the backend closes the feed.
    pub async fn recv(&mut self) -> Option<PaymentStatus> {
        self.rx.recv().await
    }
}

/// The remote service boundary.
///
/// Everything non-trivial (stock decrement, payment transition, sale
/// atomicity) lives behind this port; the client treats it as opaque.
#[async_trait]
pub trait PdvBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser>;
    async fn sign_out(&self) -> Result<()>;

    async fn fetch_products(&self) -> Result<Vec<Product>>;
    async fn resolve_store(&self, user_id: &str) -> Result<Option<StoreId>>;
    async fn fetch_sales(&self, store_id: &StoreId) -> Result<Vec<SaleRecord>>;
    async fn fetch_metrics(&self, store_id: &StoreId) -> Result<DashboardMetrics>;

    /// Transactional sale creation. Must be atomic server-side.
    async fn create_sale(&self, request: SaleRequest) -> Result<SaleReceipt>;

    /// Current payment status of a sale (the poll half of the wait).
    async fn payment_status(&self, sale_id: &SaleId) -> Result<PaymentStatus>;

    /// Push subscription for status changes of one sale.
    async fn subscribe_payment(&self, sale_id: &SaleId) -> Result<PaymentFeed>;

    /// Marks a sale as paid through the backend's payment procedure.
    async fn process_payment(&self, sale_id: &SaleId) -> Result<PaymentStatus>;
}

pub type BackendBox = std::sync::Arc<dyn PdvBackend>;
