use super::session::Session;
use super::watcher::PaymentWatcher;
use crate::domain::cart::Cart;
use crate::domain::payment::{PaymentMethod, PaymentStatus};
use crate::domain::ports::BackendBox;
use crate::domain::product::Product;
use crate::domain::sale::{DashboardMetrics, SaleId, SaleRecord, SaleRequest};
use crate::error::{PdvError, Result};

/// The nine screens of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard,
    Products,
    NewSale,
    PaymentMethod,
    PaymentWaiting,
    PaymentConfirmation,
    SalesHistory,
    Profile,
}

/// Sequences the sale flow.
///
/// Owns the current screen, the active cart, the chosen payment method and
/// the in-flight sale id. All transitions are synchronous except the ones
/// that resolve against the backend; a failed backend call surfaces its
/// error and leaves the screen unchanged.
pub struct SaleFlow {
    backend: BackendBox,
    screen: Screen,
    session: Option<Session>,
    cart: Cart,
    method: Option<PaymentMethod>,
    sale_id: Option<SaleId>,
}

impl SaleFlow {
    pub fn new(backend: BackendBox) -> Self {
        Self {
            backend,
            screen: Screen::Login,
            session: None,
            cart: Cart::new(),
            method: None,
            sale_id: None,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn sale_id(&self) -> Option<&SaleId> {
        self.sale_id.as_ref()
    }

    fn expect_screen(&self, expected: Screen) -> Result<()> {
        if self.screen == expected {
            Ok(())
        } else {
            Err(PdvError::Validation(format!(
                "action not available on the {:?} screen",
                self.screen
            )))
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| PdvError::Auth("not signed in".to_string()))
    }

    /// Signs in and lands on the dashboard. The store id is resolved
    /// eagerly here; a failed resolution is tolerated (a direct lookup
    /// happens again at sale time).
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        self.expect_screen(Screen::Login)?;
        let user = self.backend.sign_in(email, password).await?;
        self.enter_session(Session::new(user)).await;
        Ok(())
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<()> {
        self.expect_screen(Screen::Login)?;
        let user = self.backend.sign_up(email, password).await?;
        self.enter_session(Session::new(user)).await;
        Ok(())
    }

    async fn enter_session(&mut self, mut session: Session) {
        if let Err(err) = session.ensure_store(self.backend.as_ref()).await {
            tracing::warn!(error = %err, "store not resolved at sign-in, deferring to sale time");
        }
        self.session = Some(session);
        self.screen = Screen::Dashboard;
    }

    /// Signs out from any authenticated screen: cart, method, sale id and
    /// session are all cleared.
    pub async fn sign_out(&mut self) -> Result<()> {
        if self.screen == Screen::Login {
            return Err(PdvError::Validation("already signed out".to_string()));
        }
        self.backend.sign_out().await?;
        self.session = None;
        self.cart.clear();
        self.method = None;
        self.sale_id = None;
        self.screen = Screen::Login;
        Ok(())
    }

    /// Starts a new sale with an empty cart, from the dashboard or from the
    /// confirmation screen.
    pub fn start_new_sale(&mut self) -> Result<()> {
        match self.screen {
            Screen::Dashboard | Screen::PaymentConfirmation => {
                self.cart.clear();
                self.method = None;
                self.sale_id = None;
                self.screen = Screen::NewSale;
                Ok(())
            }
            _ => Err(PdvError::Validation(
                "a sale can only start from the dashboard or a finished sale".to_string(),
            )),
        }
    }

    pub fn go_to_products(&mut self) -> Result<()> {
        self.expect_screen(Screen::Dashboard)?;
        self.screen = Screen::Products;
        Ok(())
    }

    pub fn go_to_sales_history(&mut self) -> Result<()> {
        self.expect_screen(Screen::Dashboard)?;
        self.screen = Screen::SalesHistory;
        Ok(())
    }

    pub fn go_to_profile(&mut self) -> Result<()> {
        self.expect_screen(Screen::Dashboard)?;
        self.screen = Screen::Profile;
        Ok(())
    }

    pub fn back_to_dashboard(&mut self) -> Result<()> {
        match self.screen {
            Screen::Products | Screen::SalesHistory | Screen::Profile | Screen::NewSale => {
                self.screen = Screen::Dashboard;
                Ok(())
            }
            _ => Err(PdvError::Validation(
                "cannot navigate to the dashboard from here".to_string(),
            )),
        }
    }

    pub fn add_to_cart(&mut self, product: &Product) -> Result<()> {
        self.expect_screen(Screen::NewSale)?;
        self.cart.add(product);
        Ok(())
    }

    pub fn remove_from_cart(&mut self, product: &Product) -> Result<()> {
        self.expect_screen(Screen::NewSale)?;
        self.cart.remove(product);
        Ok(())
    }

    /// Finalizes cart building and moves on to payment-method selection.
    /// Requires a non-empty cart.
    pub fn finalize(&mut self) -> Result<()> {
        self.expect_screen(Screen::NewSale)?;
        if self.cart.is_empty() {
            return Err(PdvError::Validation(
                "cannot finalize an empty sale".to_string(),
            ));
        }
        self.screen = Screen::PaymentMethod;
        Ok(())
    }

    /// Submits the sale with the chosen method.
    ///
    /// On `PENDING` the flow moves to the waiting screen, on `PAID` straight
    /// to confirmation. Any backend failure (including an unresolvable
    /// store) leaves the flow on the payment-method screen.
    pub async fn choose_method(&mut self, method: PaymentMethod) -> Result<PaymentStatus> {
        self.expect_screen(Screen::PaymentMethod)?;
        // The cart is consumed on submission, so a re-entry after backing
        // out of the waiting screen must not produce an empty sale
        if self.cart.is_empty() {
            return Err(PdvError::Validation(
                "cannot submit a sale without items".to_string(),
            ));
        }

        let backend = self.backend.clone();
        let store_id = self.session_mut()?.ensure_store(backend.as_ref()).await?;
        let request = SaleRequest::from_cart(store_id, &self.cart, method);

        let receipt = self.backend.create_sale(request).await?;
        tracing::info!(sale_id = %receipt.sale_id, status = ?receipt.status, "sale created");

        self.method = Some(method);
        self.sale_id = Some(receipt.sale_id);
        self.cart.clear();
        self.screen = match receipt.status {
            PaymentStatus::Pending => Screen::PaymentWaiting,
            PaymentStatus::Paid => Screen::PaymentConfirmation,
        };
        Ok(receipt.status)
    }

    /// Starts the subscription+poll payment watcher for the sale being
    /// waited on. The caller awaits the watcher and reports back through
    /// [`SaleFlow::payment_confirmed`] or [`SaleFlow::abort_wait`].
    pub async fn watch_payment(&self) -> Result<PaymentWatcher> {
        self.expect_screen(Screen::PaymentWaiting)?;
        let sale_id = self
            .sale_id
            .clone()
            .ok_or_else(|| PdvError::Sale("no sale in flight".to_string()))?;
        PaymentWatcher::spawn(self.backend.clone(), sale_id).await
    }

    /// The waiting screen learned the payment is through.
    pub fn payment_confirmed(&mut self) -> Result<()> {
        self.expect_screen(Screen::PaymentWaiting)?;
        self.screen = Screen::PaymentConfirmation;
        Ok(())
    }

    /// Back navigation from the waiting screen, returning to method
    /// selection with the sale still pending on the backend.
    pub fn abort_wait(&mut self) -> Result<()> {
        self.expect_screen(Screen::PaymentWaiting)?;
        self.screen = Screen::PaymentMethod;
        Ok(())
    }

    pub async fn load_products(&self) -> Result<Vec<Product>> {
        self.backend
            .fetch_products()
            .await
            .map_err(|err| PdvError::Fetch(err.to_string()))
    }

    pub async fn load_sales(&mut self) -> Result<Vec<SaleRecord>> {
        let backend = self.backend.clone();
        let store_id = self.session_mut()?.ensure_store(backend.as_ref()).await?;
        self.backend
            .fetch_sales(&store_id)
            .await
            .map_err(|err| PdvError::Fetch(err.to_string()))
    }

    pub async fn load_metrics(&mut self) -> Result<DashboardMetrics> {
        let backend = self.backend.clone();
        let store_id = self.session_mut()?.ensure_store(backend.as_ref()).await?;
        self.backend
            .fetch_metrics(&store_id)
            .await
            .map_err(|err| PdvError::Fetch(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::PdvBackend;
    use crate::infrastructure::in_memory::InMemoryBackend;
    use std::sync::Arc;

    async fn signed_in_flow(backend: Arc<InMemoryBackend>) -> SaleFlow {
        let mut flow = SaleFlow::new(backend);
        flow.sign_in("owner@example.com", "secret").await.unwrap();
        flow
    }

    #[tokio::test]
    async fn test_sign_in_lands_on_dashboard() {
        let backend = Arc::new(InMemoryBackend::new());
        let flow = signed_in_flow(backend).await;
        assert_eq!(flow.screen(), Screen::Dashboard);
        assert!(flow.session().is_some());
    }

    #[tokio::test]
    async fn test_failed_sign_in_stays_on_login() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = SaleFlow::new(backend);

        let err = flow.sign_in("owner@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, PdvError::Auth(_)));
        assert_eq!(flow.screen(), Screen::Login);
        assert!(flow.session().is_none());
    }

    #[tokio::test]
    async fn test_new_sale_clears_cart() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend.clone()).await;

        flow.start_new_sale().unwrap();
        assert_eq!(flow.screen(), Screen::NewSale);

        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        assert!(!flow.cart().is_empty());

        flow.back_to_dashboard().unwrap();
        flow.start_new_sale().unwrap();
        assert!(flow.cart().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_requires_non_empty_cart() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend).await;
        flow.start_new_sale().unwrap();

        let err = flow.finalize().unwrap_err();
        assert!(matches!(err, PdvError::Validation(_)));
        assert_eq!(flow.screen(), Screen::NewSale);
    }

    #[tokio::test]
    async fn test_pending_sale_goes_to_waiting() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();

        let status = flow.choose_method(PaymentMethod::Cash).await.unwrap();

        assert_eq!(status, PaymentStatus::Pending);
        assert_eq!(flow.screen(), Screen::PaymentWaiting);
        assert!(flow.sale_id().is_some());
        assert!(flow.cart().is_empty());
    }

    #[tokio::test]
    async fn test_paid_sale_goes_to_confirmation() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_immediate_payment(true);
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();

        let status = flow.choose_method(PaymentMethod::Pix).await.unwrap();

        assert_eq!(status, PaymentStatus::Paid);
        assert_eq!(flow.screen(), Screen::PaymentConfirmation);
    }

    #[tokio::test]
    async fn test_create_sale_failure_stays_on_payment_method() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_fail_create_sale(true);
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();

        let err = flow.choose_method(PaymentMethod::Cash).await.unwrap_err();

        assert!(matches!(err, PdvError::Sale(_)));
        assert_eq!(flow.screen(), Screen::PaymentMethod);
        // Cart untouched so the sale can be retried
        assert!(!flow.cart().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_store_fails_sale() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_store_missing(true);
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();

        let err = flow.choose_method(PaymentMethod::Cash).await.unwrap_err();

        assert!(matches!(err, PdvError::StoreNotFound));
        assert_eq!(flow.screen(), Screen::PaymentMethod);
    }

    #[tokio::test]
    async fn test_sign_out_resets_everything() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();

        flow.sign_out().await.unwrap();

        assert_eq!(flow.screen(), Screen::Login);
        assert!(flow.session().is_none());
        assert!(flow.cart().is_empty());
        assert!(flow.sale_id().is_none());
    }

    #[tokio::test]
    async fn test_navigation_from_dashboard() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend).await;

        flow.go_to_products().unwrap();
        assert_eq!(flow.screen(), Screen::Products);
        flow.back_to_dashboard().unwrap();

        flow.go_to_sales_history().unwrap();
        assert_eq!(flow.screen(), Screen::SalesHistory);
        flow.back_to_dashboard().unwrap();

        flow.go_to_profile().unwrap();
        assert_eq!(flow.screen(), Screen::Profile);
    }

    #[tokio::test]
    async fn test_payment_confirmed_transition() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();
        flow.choose_method(PaymentMethod::Pix).await.unwrap();
        assert_eq!(flow.screen(), Screen::PaymentWaiting);

        flow.payment_confirmed().unwrap();
        assert_eq!(flow.screen(), Screen::PaymentConfirmation);

        // "New sale" from the confirmation screen starts over
        flow.start_new_sale().unwrap();
        assert_eq!(flow.screen(), Screen::NewSale);
        assert!(flow.cart().is_empty());
    }

    #[tokio::test]
    async fn test_resubmit_after_abort_does_not_create_empty_sale() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();
        flow.choose_method(PaymentMethod::Cash).await.unwrap();

        flow.abort_wait().unwrap();
        assert!(flow.cart().is_empty());

        // The cart went with the first submission; choosing a method again
        // must fail instead of creating a zero-total sale
        let err = flow.choose_method(PaymentMethod::Cash).await.unwrap_err();
        assert!(matches!(err, PdvError::Validation(_)));
        assert_eq!(flow.screen(), Screen::PaymentMethod);

        let sales = backend
            .fetch_sales(&crate::domain::sale::StoreId::new("store-1"))
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_wait_returns_to_method_selection() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend.clone()).await;
        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();
        flow.choose_method(PaymentMethod::Link).await.unwrap();

        flow.abort_wait().unwrap();
        assert_eq!(flow.screen(), Screen::PaymentMethod);
    }

    #[tokio::test]
    async fn test_metrics_and_sales_loaders() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut flow = signed_in_flow(backend.clone()).await;

        let metrics = flow.load_metrics().await.unwrap();
        assert_eq!(metrics.sales_today, 0);

        flow.start_new_sale().unwrap();
        let products = flow.load_products().await.unwrap();
        flow.add_to_cart(&products[0]).unwrap();
        flow.finalize().unwrap();
        flow.choose_method(PaymentMethod::Cash).await.unwrap();

        flow.abort_wait().unwrap();
        // back out of the sale entirely
        flow.screen = Screen::Dashboard;
        let sales = flow.load_sales().await.unwrap();
        assert_eq!(sales.len(), 1);
    }
}
