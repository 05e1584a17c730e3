//! Subscriber-facing broadcast transport.
//!
//! - `frame` - length-prefixed JSON framing
//! - `subscribers` - [`SubscriberRegistry`], the live subscriber set and
//!   current frame
//! - `server` - [`BroadcastServer`], the TCP accept loop

pub mod frame;
mod server;
mod subscribers;

pub use frame::{decode_payload, encode_payload, frame_codec};
pub use server::BroadcastServer;
pub use subscribers::{SubscriberGuard, SubscriberRegistry};
