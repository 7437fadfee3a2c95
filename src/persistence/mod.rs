//! Local state: the in-memory airdrop registry and the CSV stats ledger

pub mod airdrop_store;
pub mod stats_recorder;

pub use airdrop_store::AirdropStore;
pub use stats_recorder::CsvStatsRecorder;
