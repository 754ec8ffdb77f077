//! Domain layer for ws-line-bridge.
//!
//! Pure types with no dependencies on I/O, networking, or async runtimes:
//!
//! - Line framing (the delimiter, the accumulator, outbound framing)
//! - Session identity and per-half lifecycle state
//! - Configuration structures
//!
//! No `tokio`, `TcpStream`, or WebSocket types belong here.

pub mod config;
pub mod framing;
pub mod session;

pub use config::BridgeConfig;
pub use framing::{frame_outbound, trim_unit, LineAccumulator, DELIMITER};
pub use session::{HalfState, SessionId};
