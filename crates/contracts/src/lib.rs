//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the streamer.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Frames carry a capture offset measured from the start of the stream
//! - `seq` is a strictly increasing capture counter, gaps mean evicted frames

mod blueprint;
mod error;
mod frame;
mod frame_source;
mod telemetry;
mod transport;

pub use blueprint::*;
pub use error::*;
pub use frame::*;
pub use frame_source::{FrameSource, LocalFrameSource};
pub use telemetry::*;
pub use transport::*;
