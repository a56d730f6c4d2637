//! Gate-side recognition host.
//!
//! Wires camera snapshot sources, the recognition engine, per-channel
//! debouncing and ledger delivery into long-running channel tasks.

pub mod channel;
pub mod config;
pub mod reporter;
pub mod source;

pub use channel::{spawn_channel, ChannelHandles};
pub use config::{ChannelConfig, GateConfig};
pub use reporter::{HttpLedgerReporter, LedgerReporter, LogReporter};
pub use source::{FrameSource, HttpSnapshotSource};
