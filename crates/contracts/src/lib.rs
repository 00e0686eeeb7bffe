//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend only on this crate, never the other way round.
//!
//! ## What lives here
//! - `DataFrame` / `Payload` / `EventName`: the unit pushed to a client
//! - `SessionId`: the caller-supplied channel key
//! - `ChannelState` / `LifecycleEvent`: the channel state machine vocabulary
//! - `Transport`: the seam to whatever HTTP layer owns the connection
//! - `StreamerConfig`: loaded by `config_loader`

mod config;
mod error;
mod frame;
mod session_id;
mod state;
mod transport;

pub use config::*;
pub use error::*;
pub use frame::*;
pub use session_id::SessionId;
pub use state::*;
pub use transport::{LocalTransport, Transport};
