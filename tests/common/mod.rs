use pdv_core::application::controller::SaleFlow;
use pdv_core::domain::product::{Price, Product, ProductId};
use pdv_core::infrastructure::in_memory::{self, InMemoryBackend};
use rust_decimal::Decimal;
use std::sync::Arc;

pub fn product(id: &str, name: &str, cents: i64, stock: u32) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price: Price::new(Decimal::new(cents, 2)).unwrap(),
        stock,
    }
}

pub fn backend_with(products: Vec<Product>) -> Arc<InMemoryBackend> {
    Arc::new(InMemoryBackend::with_products(products))
}

pub async fn signed_in_flow(backend: Arc<InMemoryBackend>) -> SaleFlow {
    let mut flow = SaleFlow::new(backend);
    flow.sign_in(in_memory::SEED_EMAIL, in_memory::SEED_PASSWORD)
        .await
        .expect("seeded sign-in");
    flow
}
