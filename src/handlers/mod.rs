pub mod c2b_webhooks;
pub mod daraja_handlers;
pub mod merchants;
pub mod transactions;
