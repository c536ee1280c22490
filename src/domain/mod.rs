pub mod cart;
pub mod payment;
pub mod ports;
pub mod product;
pub mod sale;
