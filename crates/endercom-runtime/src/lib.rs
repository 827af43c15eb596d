//! # endercom-runtime
//!
//! Runs an agent on a frequency: fetch new messages, hand each one to the
//! message handler in order, publish the reply, wait, repeat.
//!
//! ```text
//!   Agent ──spawn──▶ PollingEngine ──fetch/publish──▶ Transport
//!     │                   │
//!     │                   └──invoke──▶ HandlerAdapter ──▶ MessageHandler
//!     └──────── RunHandle (cancel, state, events, join)
//! ```

pub mod agent;
pub mod backoff;
pub mod engine;
pub mod handle;

pub use agent::Agent;
pub use engine::{EngineState, PollingEngine, RunSummary};
pub use handle::RunHandle;
