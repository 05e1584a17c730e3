//! Now Playing Core - shared library for the now-playing relay.
//!
//! This crate merges "now playing" state from independent media sources (a
//! network renderer and the AirPlay metadata pipe) into one session record and
//! pushes that record to every connected display client.
//!
//! # Architecture
//!
//! - [`pipe`]: Metadata-pipe decoding and the reopen loop
//! - [`sources`]: Source adapters (pipe, renderer, scripted demo)
//! - [`session`]: The session record and its reconciler
//! - [`artwork`]: Cover-art thumbnail cache
//! - [`api`]: Length-prefixed JSON broadcast over TCP
//! - [`events`]: Normalized source events and snapshot emitters
//! - [`state`]: Core configuration
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//! - [`SnapshotEmitter`](events::SnapshotEmitter): Publishing committed records
//! - [`PipeOpener`](pipe::PipeOpener): Opening the metadata pipe
//! - [`PipeEventHandler`](pipe::PipeEventHandler): Consuming decoded pipe events

// Allow missing docs on plain data fields
#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod artwork;
pub mod bootstrap;
pub mod error;
pub mod events;
pub mod pipe;
pub mod protocol_constants;
pub mod runtime;
pub mod session;
pub mod sources;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types at the crate root
pub use artwork::ArtCache;
pub use error::{ErrorCode, NowPlayingError, NowPlayingResult};
pub use events::{MetadataEvent, MetadataUpdate, SnapshotEmitter, SourceEvent, TransportEvent};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use session::{PlayerState, SessionReconciler, SessionRecord, SessionSnapshot};
pub use state::Config;

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{BroadcastServer, SubscriberRegistry};
