//! Daybook - conversational wellness logging
//!
//! Turns free-text chat messages into structured, incrementally-completed
//! wellness records. The core is a multi-turn slot-filling loop: extract a
//! partial candidate from each message, merge it into what earlier turns
//! confirmed without clobbering anything, ask for what is still missing
//! (once), and persist when complete or when the clarification budget runs
//! out.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod storage;
pub mod sync;
pub mod types;

pub use agent::{ConversationState, TurnController};
pub use error::{DaybookError, Result};
pub use storage::Storage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
