use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{AuthUser, PaymentFeed, PdvBackend};
use crate::domain::product::{Price, Product, ProductId};
use crate::domain::sale::{
    DashboardMetrics, SaleId, SaleRecord, SaleReceipt, SaleRequest, StoreId,
};
use crate::error::{PdvError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Credentials and ids the in-memory backend is seeded with.
pub const SEED_EMAIL: &str = "owner@example.com";
pub const SEED_PASSWORD: &str = "secret";
pub const SEED_USER_ID: &str = "user-1";
pub const SEED_STORE_ID: &str = "store-1";

struct StoredSale {
    record: SaleRecord,
    listeners: Vec<mpsc::Sender<PaymentStatus>>,
}

/// In-memory stand-in for the remote service.
///
/// Deterministic double used by tests and the CLI driver: seeded catalog,
/// one seeded user/store pair, and knobs to force the failure modes the
/// flow has to survive. Payment pushes go out over per-sale channels the
/// way the real backend's change feed would.
pub struct InMemoryBackend {
    products: Arc<RwLock<Vec<Product>>>,
    sales: Arc<RwLock<HashMap<SaleId, StoredSale>>>,
    next_sale: AtomicU64,
    immediate_payment: AtomicBool,
    fail_create_sale: AtomicBool,
    store_missing: AtomicBool,
    push_enabled: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let products = vec![
            Product {
                id: ProductId::new("p-1"),
                name: "Espresso".to_string(),
                price: Price::new(Decimal::new(900, 2)).expect("seed price"),
                stock: 10,
            },
            Product {
                id: ProductId::new("p-2"),
                name: "Cheese bread".to_string(),
                price: Price::new(Decimal::new(550, 2)).expect("seed price"),
                stock: 4,
            },
            Product {
                id: ProductId::new("p-3"),
                name: "Orange juice".to_string(),
                price: Price::new(Decimal::new(700, 2)).expect("seed price"),
                stock: 0,
            },
        ];
        Self::with_products(products)
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(RwLock::new(products)),
            sales: Arc::new(RwLock::new(HashMap::new())),
            next_sale: AtomicU64::new(1),
            immediate_payment: AtomicBool::new(false),
            fail_create_sale: AtomicBool::new(false),
            store_missing: AtomicBool::new(false),
            push_enabled: AtomicBool::new(true),
        }
    }

    /// Signs in as the seeded user without going through credentials.
    pub async fn seeded_sign_in(&self) -> AuthUser {
        AuthUser {
            id: SEED_USER_ID.to_string(),
            email: SEED_EMAIL.to_string(),
        }
    }

    /// Sales created by this backend resolve as already `PAID`.
    pub fn set_immediate_payment(&self, on: bool) {
        self.immediate_payment.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_create_sale(&self, on: bool) {
        self.fail_create_sale.store(on, Ordering::SeqCst);
    }

    pub fn set_store_missing(&self, on: bool) {
        self.store_missing.store(on, Ordering::SeqCst);
    }

    /// Disables the push feed; only polling can observe status changes.
    pub fn set_push_enabled(&self, on: bool) {
        self.push_enabled.store(on, Ordering::SeqCst);
    }

    /// Seeds a pending sale directly, bypassing the cart flow.
    pub async fn seed_pending_sale(&self, id: &str) -> SaleId {
        let sale_id = SaleId::new(id);
        let record = SaleRecord {
            id: sale_id.clone(),
            total: Price::ZERO,
            payment_method: crate::domain::payment::PaymentMethod::Pix,
            status: PaymentStatus::Pending,
            created_at: String::new(),
        };
        self.sales.write().await.insert(
            sale_id.clone(),
            StoredSale {
                record,
                listeners: Vec::new(),
            },
        );
        sale_id
    }

    /// Flips a sale to `PAID` and notifies its subscribers.
    pub async fn mark_paid(&self, sale_id: &SaleId) {
        let mut sales = self.sales.write().await;
        if let Some(sale) = sales.get_mut(sale_id) {
            sale.record.status = PaymentStatus::Paid;
            if self.push_enabled.load(Ordering::SeqCst) {
                for listener in &sale.listeners {
                    let _ = listener.try_send(PaymentStatus::Paid);
                }
            }
        }
    }
}

#[async_trait]
impl PdvBackend for InMemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        if email == SEED_EMAIL && password == SEED_PASSWORD {
            Ok(self.seeded_sign_in().await)
        } else {
            Err(PdvError::Auth("invalid credentials".to_string()))
        }
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<AuthUser> {
        Ok(AuthUser {
            id: format!("user-{email}"),
            email: email.to_string(),
        })
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().await.clone())
    }

    async fn resolve_store(&self, user_id: &str) -> Result<Option<StoreId>> {
        if self.store_missing.load(Ordering::SeqCst) || user_id != SEED_USER_ID {
            Ok(None)
        } else {
            Ok(Some(StoreId::new(SEED_STORE_ID)))
        }
    }

    async fn fetch_sales(&self, _store_id: &StoreId) -> Result<Vec<SaleRecord>> {
        let sales = self.sales.read().await;
        Ok(sales.values().map(|sale| sale.record.clone()).collect())
    }

    async fn fetch_metrics(&self, store_id: &StoreId) -> Result<DashboardMetrics> {
        let sales = self.fetch_sales(store_id).await?;
        let paid: Vec<_> = sales
            .iter()
            .filter(|sale| sale.status.is_paid())
            .collect();
        let revenue = paid
            .iter()
            .fold(Price::ZERO, |acc, sale| acc + sale.total);
        Ok(DashboardMetrics {
            sales_today: paid.len() as u32,
            revenue_today: revenue,
        })
    }

    async fn create_sale(&self, request: SaleRequest) -> Result<SaleReceipt> {
        if self.fail_create_sale.load(Ordering::SeqCst) {
            return Err(PdvError::Sale("backend rejected the sale".to_string()));
        }

        // Authoritative stock check, the one the cart only approximates.
        // The whole batch is validated before any stock moves so a failed
        // sale leaves the catalog untouched.
        let mut products = self.products.write().await;
        let mut decrements = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let index = products
                .iter()
                .position(|p| p.id == item.product_id)
                .ok_or_else(|| PdvError::Sale(format!("unknown product {}", item.product_id)))?;
            if products[index].stock < item.quantity {
                return Err(PdvError::Sale(format!(
                    "insufficient stock for {}",
                    products[index].name
                )));
            }
            decrements.push((index, item.quantity));
        }
        for (index, quantity) in decrements {
            products[index].stock -= quantity;
        }

        let status = if self.immediate_payment.load(Ordering::SeqCst) {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };
        let sale_id = SaleId::new(format!(
            "sale-{}",
            self.next_sale.fetch_add(1, Ordering::SeqCst)
        ));
        let record = SaleRecord {
            id: sale_id.clone(),
            total: request.total,
            payment_method: request.payment_method,
            status,
            created_at: String::new(),
        };
        self.sales.write().await.insert(
            sale_id.clone(),
            StoredSale {
                record,
                listeners: Vec::new(),
            },
        );

        Ok(SaleReceipt { sale_id, status })
    }

    async fn payment_status(&self, sale_id: &SaleId) -> Result<PaymentStatus> {
        let sales = self.sales.read().await;
        sales
            .get(sale_id)
            .map(|sale| sale.record.status)
            .ok_or_else(|| PdvError::Fetch(format!("unknown sale {sale_id}")))
    }

    async fn subscribe_payment(&self, sale_id: &SaleId) -> Result<PaymentFeed> {
        let (tx, rx) = mpsc::channel(4);
        let mut sales = self.sales.write().await;
        let sale = sales
            .get_mut(sale_id)
            .ok_or_else(|| PdvError::Fetch(format!("unknown sale {sale_id}")))?;
        // A subscription taken out after the fact still sees the terminal
        // state once
        if sale.record.status.is_paid() && self.push_enabled.load(Ordering::SeqCst) {
            let _ = tx.try_send(PaymentStatus::Paid);
        }
        sale.listeners.push(tx);
        Ok(PaymentFeed::new(rx))
    }

    async fn process_payment(&self, sale_id: &SaleId) -> Result<PaymentStatus> {
        self.mark_paid(sale_id).await;
        self.payment_status(sale_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::Cart;
    use crate::domain::payment::PaymentMethod;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_sale_decrements_stock() {
        let backend = InMemoryBackend::new();
        let products = backend.fetch_products().await.unwrap();
        let mut cart = Cart::new();
        cart.add(&products[0]);
        cart.add(&products[0]);

        let request =
            SaleRequest::from_cart(StoreId::new(SEED_STORE_ID), &cart, PaymentMethod::Cash);
        backend.create_sale(request).await.unwrap();

        let after = backend.fetch_products().await.unwrap();
        let sold = after.iter().find(|p| p.id == products[0].id).unwrap();
        assert_eq!(sold.stock, products[0].stock - 2);
    }

    #[tokio::test]
    async fn test_create_sale_rejects_oversell() {
        let backend = InMemoryBackend::with_products(vec![Product {
            id: ProductId::new("p-1"),
            name: "Scarce".to_string(),
            price: Price::new(dec!(1.00)).unwrap(),
            stock: 1,
        }]);

        // Build a request from a stale snapshot claiming more stock
        let stale = Product {
            id: ProductId::new("p-1"),
            name: "Scarce".to_string(),
            price: Price::new(dec!(1.00)).unwrap(),
            stock: 5,
        };
        let mut cart = Cart::new();
        cart.add(&stale);
        cart.add(&stale);
        let request =
            SaleRequest::from_cart(StoreId::new(SEED_STORE_ID), &cart, PaymentMethod::Cash);

        let err = backend.create_sale(request).await.unwrap_err();
        assert!(matches!(err, PdvError::Sale(_)));
    }

    #[tokio::test]
    async fn test_failed_sale_leaves_stock_untouched() {
        let backend = InMemoryBackend::with_products(vec![
            Product {
                id: ProductId::new("p-1"),
                name: "Plenty".to_string(),
                price: Price::new(dec!(2.00)).unwrap(),
                stock: 10,
            },
            Product {
                id: ProductId::new("p-2"),
                name: "Scarce".to_string(),
                price: Price::new(dec!(3.00)).unwrap(),
                stock: 1,
            },
        ]);

        // Second line oversells against a stale snapshot
        let plenty = backend.fetch_products().await.unwrap()[0].clone();
        let stale = Product {
            id: ProductId::new("p-2"),
            name: "Scarce".to_string(),
            price: Price::new(dec!(3.00)).unwrap(),
            stock: 5,
        };
        let mut cart = Cart::new();
        cart.add(&plenty);
        cart.add(&plenty);
        cart.add(&stale);
        cart.add(&stale);
        let request =
            SaleRequest::from_cart(StoreId::new(SEED_STORE_ID), &cart, PaymentMethod::Cash);

        let err = backend.create_sale(request).await.unwrap_err();
        assert!(matches!(err, PdvError::Sale(_)));

        // The rejected sale must not have moved any stock
        let after = backend.fetch_products().await.unwrap();
        assert_eq!(after.iter().find(|p| p.name == "Plenty").unwrap().stock, 10);
        assert_eq!(after.iter().find(|p| p.name == "Scarce").unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_process_payment_marks_paid() {
        let backend = InMemoryBackend::new();
        let sale_id = backend.seed_pending_sale("sale-x").await;

        let status = backend.process_payment(&sale_id).await.unwrap();
        assert!(status.is_paid());
        assert!(backend.payment_status(&sale_id).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_late_subscription_sees_terminal_state() {
        let backend = InMemoryBackend::new();
        let sale_id = backend.seed_pending_sale("sale-x").await;
        backend.mark_paid(&sale_id).await;

        let mut feed = backend.subscribe_payment(&sale_id).await.unwrap();
        assert_eq!(feed.recv().await, Some(PaymentStatus::Paid));
    }
}
