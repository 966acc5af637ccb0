pub mod daraja_service;
pub mod dispatcher;
pub mod idempotency;
pub mod rule_engine;
pub mod token_cache;
