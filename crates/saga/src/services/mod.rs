//! External service contracts and in-memory implementations.

pub mod payment;

pub use payment::{InMemoryPaymentService, PaymentError, PaymentReceipt, PaymentService};
