//! dragonboard-io: File access and navigation for Dragon board runs.
//!
//! Files are memory-mapped via memmap2 and decoded through a
//! [`FrameStream`], which owns the recency tracker of the run and supports
//! stepping back one frame.
//!

mod batch;
mod error;
mod reader;
mod stream;
mod writer;

pub use batch::{calibrate_frames, calibrate_frames_with_threads};
pub use error::{Error, Result};
pub use reader::{DragonFileReader, MappedFileReader, SharedMmap};
pub use stream::FrameStream;
pub use writer::DragonFileWriter;
