//! Metadata pipe protocol.
//!
//! - `item` - parsing of one `<item>` block
//! - `decoder` - [`PipeDecoder`], buffering and the staged track accumulator
//! - `supervisor` - [`PipeSupervisor`], the open/read/backoff loop

mod decoder;
mod item;
mod supervisor;

pub use decoder::{pipe_songid, PipeDecoder, PipeEvent, PipeTrack};
pub use item::{parse_item, PipeItem};
pub use supervisor::{
    FifoOpener, PipeEventHandler, PipeOpener, PipeSignal, PipeState, PipeSupervisor,
};
