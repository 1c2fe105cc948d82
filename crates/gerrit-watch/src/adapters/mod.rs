//! Adapters: concrete implementations of the ports plus the record log.

pub mod record_log;
pub mod ssh;

pub use record_log::{RecordLog, Replay};
pub use ssh::SshEventSource;
