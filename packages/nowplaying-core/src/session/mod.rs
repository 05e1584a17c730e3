//! The unified "now playing" session.
//!
//! - `record` - [`SessionRecord`], [`PlayerState`] and [`SessionSnapshot`]
//! - `reconciler` - [`SessionReconciler`], the single owner of the record

mod reconciler;
mod record;

pub use reconciler::{ArtCompletion, SessionReconciler};
pub use record::{PlayerState, SessionRecord, SessionSnapshot};
