// src/models/mod.rs
pub mod catalog;
pub mod game;
pub mod payment;
pub mod response;

// Re-export commonly used types so other modules can use `crate::models::X`
pub use catalog::{MerchItem, OrderItem, SubscriptionPlan};
pub use payment::{ConversionRate, Invoice, InvoiceState, Money, Quote};
pub use response::ApiResponse;
