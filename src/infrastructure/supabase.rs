use crate::config::BackendConfig;
use crate::domain::payment::{PaymentMethod, PaymentStatus};
use crate::domain::ports::{AuthUser, PaymentFeed, PdvBackend};
use crate::domain::product::{Price, Product, ProductId};
use crate::domain::sale::{
    DashboardMetrics, SaleId, SaleRecord, SaleReceipt, SaleRequest, StoreId,
};
use crate::error::{PdvError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use url::Url;

/// How often the subscription bridge re-reads the sale status.
const FEED_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserResponse,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    email: String,
}

#[derive(Deserialize)]
struct AuthErrorResponse {
    #[serde(alias = "error_description", alias = "msg")]
    message: String,
}

#[derive(Deserialize)]
struct ProductRow {
    id: String,
    name: String,
    price: Price,
    stock_quantity: u32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            stock: row.stock_quantity,
        }
    }
}

#[derive(Deserialize)]
struct StoreRow {
    id: String,
}

#[derive(Deserialize)]
struct SaleRow {
    id: String,
    total_amount: Price,
    payment_method: PaymentMethod,
    status: PaymentStatus,
    created_at: String,
}

impl From<SaleRow> for SaleRecord {
    fn from(row: SaleRow) -> Self {
        Self {
            id: SaleId::new(row.id),
            total: row.total_amount,
            payment_method: row.payment_method,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Serialize)]
struct SaleItemPayload<'a> {
    product_id: &'a str,
    product_name: &'a str,
    quantity: u32,
    unit_price: Price,
    line_total: Price,
}

#[derive(Deserialize)]
struct CreateSaleResponse {
    sale_id: String,
    status: PaymentStatus,
}

#[derive(Deserialize)]
struct StatusOnly {
    status: PaymentStatus,
}

/// Backend-as-a-service client over the Supabase HTTP surface.
///
/// Requests carry the project `apikey` header plus an `Authorization:
/// Bearer` header — the user's access token once signed in, the API key
/// before that. Table reads go through `/rest/v1/<table>`, the
/// transactional procedures through `/rest/v1/rpc/<fn>`.
///
/// The push half of the payment wait is bridged over REST: a spawned task
/// re-reads the sale row on a short interval and forwards changes into the
/// feed channel. The port contract (push feed racing the caller's own
/// 3-second poll) is unchanged by the transport.
pub struct SupabaseBackend {
    base: Url,
    api_key: String,
    access_token: Arc<RwLock<Option<String>>>,
    client: Client,
}

impl SupabaseBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            base: config.url,
            api_key: config.api_key,
            access_token: Arc::new(RwLock::new(None)),
            client: Client::new(),
        }
    }

    fn join(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn bearer(&self) -> String {
        self.access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.api_key.clone())
    }

    async fn get_rows<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.join(path)?;
        tracing::debug!(method = "GET", url = %url, "backend request");
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PdvError::Fetch(format!("{status}: {body}")));
        }
        Ok(response.json().await?)
    }

    async fn call_rpc<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<T> {
        let url = self.join(&format!("rest/v1/rpc/{name}"))?;
        tracing::debug!(method = "POST", url = %url, "backend rpc");
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer().await)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PdvError::Sale(format!("{name} failed, {status}: {body}")));
        }
        Ok(response.json().await?)
    }

    async fn auth_request(&self, path: &str, payload: serde_json::Value) -> Result<TokenResponse> {
        let url = self.join(path)?;
        tracing::debug!(method = "POST", url = %url, "auth request");
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AuthErrorResponse>(&body)
                .map(|err| err.message)
                .unwrap_or(body);
            return Err(PdvError::Auth(message));
        }
        Ok(response.json().await?)
    }

    async fn store_token(&self, token: Option<String>) {
        let mut guard = self.access_token.write().await;
        *guard = token;
    }

    async fn read_sale_status(&self, sale_id: &SaleId) -> Result<PaymentStatus> {
        let path = format!("rest/v1/sales?id=eq.{}&select=status", sale_id.as_str());
        let rows: Vec<StatusOnly> = self.get_rows(&path).await?;
        rows.into_iter()
            .next()
            .map(|row| row.status)
            .ok_or_else(|| PdvError::Fetch(format!("unknown sale {sale_id}")))
    }
}

#[async_trait]
impl PdvBackend for SupabaseBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let token = self
            .auth_request(
                "auth/v1/token?grant_type=password",
                json!({ "email": email, "password": password }),
            )
            .await?;
        self.store_token(Some(token.access_token.clone())).await;
        Ok(AuthUser {
            id: token.user.id,
            email: token.user.email,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser> {
        let token = self
            .auth_request(
                "auth/v1/signup",
                json!({ "email": email, "password": password }),
            )
            .await?;
        self.store_token(Some(token.access_token.clone())).await;
        Ok(AuthUser {
            id: token.user.id,
            email: token.user.email,
        })
    }

    async fn sign_out(&self) -> Result<()> {
        let url = self.join("auth/v1/logout")?;
        let bearer = self.bearer().await;
        self.store_token(None).await;
        // Local teardown already happened; a failed remote logout (transport
        // or rejection) is logged so the terminal still reaches the login
        // screen
        match self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .send()
            .await
        {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = %response.status(), "remote sign-out failed");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "remote sign-out failed");
            }
        }
        Ok(())
    }

    async fn fetch_products(&self) -> Result<Vec<Product>> {
        let rows: Vec<ProductRow> = self
            .get_rows("rest/v1/products?select=*&order=name.asc")
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn resolve_store(&self, user_id: &str) -> Result<Option<StoreId>> {
        let path = format!("rest/v1/stores?owner_id=eq.{user_id}&select=id&limit=1");
        let rows: Vec<StoreRow> = self.get_rows(&path).await?;
        Ok(rows.into_iter().next().map(|row| StoreId::new(row.id)))
    }

    async fn fetch_sales(&self, store_id: &StoreId) -> Result<Vec<SaleRecord>> {
        let path = format!(
            "rest/v1/sales?store_id=eq.{}&select=*&order=created_at.desc",
            store_id.as_str()
        );
        let rows: Vec<SaleRow> = self.get_rows(&path).await?;
        Ok(rows.into_iter().map(SaleRecord::from).collect())
    }

    async fn fetch_metrics(&self, store_id: &StoreId) -> Result<DashboardMetrics> {
        let sales = self.fetch_sales(store_id).await?;
        let paid = sales.iter().filter(|sale| sale.status.is_paid());
        let mut metrics = DashboardMetrics::default();
        for sale in paid {
            metrics.sales_today += 1;
            metrics.revenue_today += sale.total;
        }
        Ok(metrics)
    }

    async fn create_sale(&self, request: SaleRequest) -> Result<SaleReceipt> {
        let items: Vec<SaleItemPayload<'_>> = request
            .items
            .iter()
            .map(|item| SaleItemPayload {
                product_id: item.product_id.as_str(),
                product_name: &item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            })
            .collect();

        let response: CreateSaleResponse = self
            .call_rpc(
                "create_sale_transaction",
                json!({
                    "p_store_id": request.store_id.as_str(),
                    "p_total_amount": request.total,
                    "p_payment_method": request.payment_method.as_backend_value(),
                    "p_items": items,
                }),
            )
            .await?;

        Ok(SaleReceipt {
            sale_id: SaleId::new(response.sale_id),
            status: response.status,
        })
    }

    async fn payment_status(&self, sale_id: &SaleId) -> Result<PaymentStatus> {
        self.read_sale_status(sale_id).await
    }

    async fn subscribe_payment(&self, sale_id: &SaleId) -> Result<PaymentFeed> {
        let (tx, rx) = mpsc::channel(4);
        let client = self.client.clone();
        let base = self.base.clone();
        let api_key = self.api_key.clone();
        let access_token = self.access_token.clone();
        let sale_id = sale_id.clone();

        tokio::spawn(async move {
            let path = format!("rest/v1/sales?id=eq.{}&select=status", sale_id.as_str());
            let url = match base.join(&path) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(error = %err, "payment feed could not build url");
                    return;
                }
            };
            let mut ticker = tokio::time::interval(FEED_INTERVAL);
            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                let bearer = access_token
                    .read()
                    .await
                    .clone()
                    .unwrap_or_else(|| api_key.clone());
                let response = client
                    .get(url.clone())
                    .header("apikey", &api_key)
                    .bearer_auth(bearer)
                    .send()
                    .await;
                let status = match response {
                    Ok(response) if response.status() == StatusCode::OK => {
                        match response.json::<Vec<StatusOnly>>().await {
                            Ok(rows) => rows.into_iter().next().map(|row| row.status),
                            Err(err) => {
                                tracing::warn!(error = %err, "payment feed decode failed");
                                None
                            }
                        }
                    }
                    Ok(response) => {
                        tracing::warn!(status = %response.status(), "payment feed request failed");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "payment feed request failed");
                        None
                    }
                };
                if let Some(status) = status
                    && status.is_paid()
                {
                    let _ = tx.send(status).await;
                    break;
                }
            }
        });

        Ok(PaymentFeed::new(rx))
    }

    async fn process_payment(&self, sale_id: &SaleId) -> Result<PaymentStatus> {
        let response: StatusOnly = self
            .call_rpc("process_payment", json!({ "p_sale_id": sale_id.as_str() }))
            .await?;
        Ok(response.status)
    }
}
