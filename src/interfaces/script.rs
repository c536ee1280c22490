use crate::domain::payment::PaymentMethod;
use crate::error::Result;
use serde::Deserialize;
use std::io::Read;

/// One scripted user action for the CLI driver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Add one unit of the product with this id to the cart.
    Add { product: String },
    /// Remove one unit of the product with this id from the cart.
    Remove { product: String },
    /// Finalize the cart and pay with the given method.
    Finalize { method: PaymentMethodArg },
}

/// Payment method as written in scripts (`pix`, `link`, `cash`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodArg {
    Pix,
    Link,
    Cash,
}

impl From<PaymentMethodArg> for PaymentMethod {
    fn from(arg: PaymentMethodArg) -> Self {
        match arg {
            PaymentMethodArg::Pix => PaymentMethod::Pix,
            PaymentMethodArg::Link => PaymentMethod::Link,
            PaymentMethodArg::Cash => PaymentMethod::Cash,
        }
    }
}

/// Parses a JSON array of actions from any `Read` source.
pub fn read_script<R: Read>(source: R) -> Result<Vec<Action>> {
    Ok(serde_json::from_reader(source)?)
}
