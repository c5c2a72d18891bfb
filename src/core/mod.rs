pub mod engine;
pub mod errors;
pub mod models;
pub mod realtime;
pub mod retry;
pub mod services;
