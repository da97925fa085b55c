//! Memory-mapped file readers.
//!

use crate::stream::FrameStream;
use crate::Result;
use dragonboard_core::Frame;
use dragonboard_drs::{probe_layout, DecoderConfig, HeaderLayout};
use log::info;
use memmap2::Mmap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
#[derive(Debug)]
pub struct MappedFileReader {
    mmap: Arc<Mmap>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap: Arc::new(mmap),
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Seekable reader over the mapping that shares it instead of copying.
    #[must_use]
    pub fn cursor(&self) -> Cursor<SharedMmap> {
        Cursor::new(SharedMmap(Arc::clone(&self.mmap)))
    }
}

/// Shared handle to a file mapping.
#[derive(Debug, Clone)]
pub struct SharedMmap(Arc<Mmap>);

impl AsRef<[u8]> for SharedMmap {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

/// A Dragon board file reader with memory-mapped I/O.
#[derive(Debug)]
pub struct DragonFileReader {
    reader: MappedFileReader,
    config: DecoderConfig,
}

impl DragonFileReader {
    /// Opens a Dragon board file with default configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self {
            reader,
            config: DecoderConfig::default(),
        })
    }

    /// Sets the decoder configuration.
    #[must_use]
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Header layout of the file, probed unless configured.
    ///
    /// # Errors
    /// Returns an error if no known layout matches.
    pub fn layout(&self) -> Result<HeaderLayout> {
        match self.config.layout {
            Some(layout) => Ok(layout),
            None => Ok(probe_layout(
                &mut self.reader.cursor(),
                self.config.lookahead_factor,
            )?),
        }
    }

    /// Stream over the frames of the file, starting at the first frame.
    ///
    /// # Errors
    /// Returns an error if the layout cannot be determined.
    pub fn frames(&self) -> Result<FrameStream<Cursor<SharedMmap>>> {
        let stream = FrameStream::with_config(self.reader.cursor(), &self.config)?;
        info!(
            "reading {} ({} bytes, layout {:?})",
            self.reader.path().display(),
            self.reader.len(),
            stream.layout()
        );
        Ok(stream)
    }

    /// Reads every frame with its recency data.
    ///
    /// # Errors
    /// Returns the first decoding error.
    pub fn read_all(&self) -> Result<Vec<Frame>> {
        self.frames()?.collect()
    }
}
