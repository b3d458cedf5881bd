//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Serving (drain.rs):
//!     request admitted → in-flight guard held until the response is done
//!
//! Shutdown (shutdown.rs):
//!     SIGINT/SIGTERM/SIGQUIT or trigger()
//!     → pre-shutdown callback
//!     → drain flag set (new requests get 503)
//!     → listener stops accepting
//!     → wait for in-flight count to reach zero (bounded)
//!     → close resources in reverse registration order (each bounded)
//!     → post-shutdown callback
//!
//! Signals (signals.rs):
//!     first termination signal wins; logged with its name
//! ```
//!
//! # Design Decisions
//! - One shared deadline bounds the whole sequence; a stuck resource is
//!   logged and skipped, never waited on forever
//! - The listener is special-cased ahead of LIFO resource order so no new
//!   work arrives while stores are torn down
//! - In-flight waiting is a short bounded polling loop over an atomic

pub mod drain;
pub mod shutdown;
pub mod signals;

pub use drain::{DrainState, InFlightGuard};
pub use shutdown::ShutdownCoordinator;
