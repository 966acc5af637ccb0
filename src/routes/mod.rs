pub mod merchants;
pub mod transactions;
pub mod webhooks;
