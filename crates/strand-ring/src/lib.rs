//! Ring membership protocol: join, leave, stabilization, liveness
//! probing, and diagnostic ring walks over a digest-ordered identifier
//! circle.

pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod probe;


pub use config::{NotifyPolicy, RingConfig};
pub use engine::{NodeEvent, Peer, RingEngine, RingSnapshot};
pub use error::RingError;
pub use node::{NodeHandle, start};
