/*
[INPUT]:  Public API exports for binance-stream-tail crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod tail;

pub use config::{OutputFormat, SubscriptionConfig, TailConfig};
pub use tail::{SubscriptionReport, TailSummary, run};
