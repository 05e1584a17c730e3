//! Source adapters.
//!
//! Each adapter wraps one media backend and reports normalized transport and
//! metadata events to the [`SessionReconciler`](crate::session::SessionReconciler).

pub mod mock;
pub mod pipe;
pub mod renderer;

pub use mock::{MockSource, MOCK_SOURCE_NAME};
pub use pipe::{PipeSource, PIPE_SOURCE_NAME};
pub use renderer::{parse_didl, RendererSource, StateVariable, RENDERER_SOURCE_NAME};
