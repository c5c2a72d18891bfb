pub mod activity;
pub mod balance;
pub mod group;
pub mod money;
pub mod transaction;

pub use activity::{ActivityEntry, ActivityEvent, ActivityHistory};
pub use balance::{BalanceSheet, Balances, IntegrityViolation, LedgerView, Transfer};
pub use group::{Group, GroupMember, Role};
pub use money::Money;
pub use transaction::{Split, Transaction, TransactionFilter, TransactionKind, TransactionStatus, UserId};
