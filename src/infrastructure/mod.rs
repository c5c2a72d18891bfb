pub mod cache;
pub mod logging;
pub mod notifier;
pub mod storage;
