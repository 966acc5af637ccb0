pub mod c2b_payload;
pub mod c2b_transaction;
pub mod incoming_event;
pub mod merchant;
pub mod validation_rule;

pub use c2b_payload::{C2bPayload, C2bResponse, MalformedPayload};
pub use c2b_transaction::{
    C2bTransaction, C2bTransactionView, TransactionFields, TransactionQuery, TransactionStatus,
};
pub use incoming_event::{EventKind, IncomingEvent, IncomingEventView};
pub use merchant::{Merchant, MerchantSummary, MerchantUpdate, ResponseType, ShortcodeType};
pub use validation_rule::{ValidationRule, ValidationRuleView};
