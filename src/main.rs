use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use pdv_core::application::controller::SaleFlow;
use pdv_core::domain::payment::PaymentStatus;
use pdv_core::domain::ports::PdvBackend;
use pdv_core::domain::product::{Product, ProductId};
use pdv_core::infrastructure::in_memory::{self, InMemoryBackend};
use pdv_core::interfaces::csv::catalog_reader::CatalogReader;
use pdv_core::interfaces::script::{read_script, Action};
use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Runs a scripted sale against the in-memory backend for manual
/// verification of the flow.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Product catalog CSV file (id, name, price, stock)
    catalog: PathBuf,

    /// JSON sale script (add/remove/finalize actions)
    #[arg(long)]
    script: PathBuf,

    /// Delay before the backend double confirms a pending payment
    #[arg(long, default_value_t = 200)]
    auto_pay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let file = File::open(&cli.catalog).into_diagnostic()?;
    let mut catalog: HashMap<ProductId, Product> = HashMap::new();
    for product in CatalogReader::new(file).products() {
        let product = product.into_diagnostic()?;
        catalog.insert(product.id.clone(), product);
    }

    let script = File::open(&cli.script).into_diagnostic()?;
    let actions = read_script(script).into_diagnostic()?;

    let backend = Arc::new(InMemoryBackend::with_products(
        catalog.values().cloned().collect(),
    ));
    let mut flow = SaleFlow::new(backend.clone());
    flow.sign_in(in_memory::SEED_EMAIL, in_memory::SEED_PASSWORD)
        .await
        .into_diagnostic()?;
    flow.start_new_sale().into_diagnostic()?;

    let lookup = |id: &str| {
        catalog
            .get(&ProductId::new(id))
            .cloned()
            .ok_or_else(|| miette!("unknown product id: {id}"))
    };

    let mut receipt = None;
    for action in actions {
        match action {
            Action::Add { product } => {
                flow.add_to_cart(&lookup(&product)?).into_diagnostic()?;
            }
            Action::Remove { product } => {
                flow.remove_from_cart(&lookup(&product)?).into_diagnostic()?;
            }
            Action::Finalize { method } => {
                // Totals print with cent precision regardless of how the
                // decimal arithmetic scaled the result
                let mut total = flow.cart().total().value();
                total.rescale(2);
                flow.finalize().into_diagnostic()?;
                let mut status = flow.choose_method(method.into()).await.into_diagnostic()?;

                if status == PaymentStatus::Pending {
                    let mut watcher = flow.watch_payment().await.into_diagnostic()?;

                    // The double plays the customer: it settles the payment
                    // after a short delay so the wait can be observed
                    let payer = backend.clone();
                    let sale_id = flow
                        .sale_id()
                        .cloned()
                        .ok_or_else(|| miette!("sale id missing after creation"))?;
                    let delay = Duration::from_millis(cli.auto_pay_ms);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Err(err) = payer.process_payment(&sale_id).await {
                            tracing::warn!(error = %err, "auto payment failed");
                        }
                    });

                    match watcher.wait().await {
                        Some(confirmed) => {
                            flow.payment_confirmed().into_diagnostic()?;
                            status = confirmed;
                        }
                        None => return Err(miette!("payment wait ended without confirmation")),
                    }
                    watcher.shutdown();
                }

                receipt = Some(json!({
                    "sale_id": flow.sale_id().map(|id| id.as_str().to_string()),
                    "status": status,
                    "total": total,
                }));
            }
        }
    }

    let summary = match receipt {
        Some(receipt) => receipt,
        None => {
            let mut total = flow.cart().total().value();
            total.rescale(2);
            json!({
                "screen": format!("{:?}", flow.screen()),
                "items": flow.cart().len(),
                "total": total,
            })
        }
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).into_diagnostic()?
    );

    Ok(())
}
