pub mod balance_calculator;
pub mod debt_simplifier;
pub mod outstanding;
pub mod payment_rules;
pub mod settlement_lifecycle;

pub use balance_calculator::compute_balances;
pub use debt_simplifier::{apply_transfers, simplify};
pub use outstanding::outstanding_debts;
pub use payment_rules::{PaymentDraft, validate_payment};
pub use settlement_lifecycle::Transition;
