//! # endercom-core
//!
//! Core types and primitives for the Endercom agent runtime: the normalized
//! [`Message`], the polling [`Cursor`], option bundles, the unified error
//! type, the event bus, and the handler adapter shared by the polling engine
//! and the server façade.

pub mod error;
pub mod event;
pub mod function;
pub mod handler;
pub mod message;
pub mod options;

pub use error::{EndercomError, HandlerError, Result};
pub use event::{AgentEvent, EventBus, StopReason};
pub use function::{FunctionHandler, FunctionInvoker, async_function_fn, function_fn};
pub use handler::{EchoHandler, HandlerAdapter, MessageHandler, async_handler_fn, handler_fn};
pub use message::{Cursor, Message, RawMessage};
pub use options::{AgentOptions, FunctionOptions, RunOptions, ServerOptions};
