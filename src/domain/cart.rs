use super::product::{Price, Product, ProductId};
use std::collections::HashMap;

/// One line of the current sale: a product plus how many units of it.
///
/// Quantity is always at least 1; a line whose quantity would drop to zero
/// is removed from the cart instead of being kept around.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// In-memory cart for the sale being built.
///
/// At most one line per product id. Purely in-memory: no I/O, no caching of
/// the total. Stock limits are enforced against the last fetched snapshot
/// as a client-side hint only.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: HashMap<ProductId, CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unit of `product`.
    ///
    /// No-op when the product has no stock, or when the line already holds
    /// as many units as the last known stock.
    pub fn add(&mut self, product: &Product) {
        match self.lines.get_mut(&product.id) {
            Some(line) => {
                if line.quantity < product.stock {
                    line.quantity += 1;
                }
            }
            None => {
                if product.stock >= 1 {
                    self.lines.insert(
                        product.id.clone(),
                        CartLine {
                            product: product.clone(),
                            quantity: 1,
                        },
                    );
                }
            }
        }
    }

    /// Removes one unit of `product`; deletes the line when it was the last
    /// unit. No-op when the product is not in the cart.
    pub fn remove(&mut self, product: &Product) {
        if let Some(line) = self.lines.get_mut(&product.id) {
            if line.quantity <= 1 {
                self.lines.remove(&product.id);
            } else {
                line.quantity -= 1;
            }
        }
    }

    /// Current sale total, recomputed from the lines on every call.
    pub fn total(&self) -> Price {
        self.lines
            .values()
            .fold(Price::ZERO, |acc, line| acc + line.line_total())
    }

    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.lines.get(id).map(|line| line.quantity).unwrap_or(0)
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
