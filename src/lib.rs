//! Read/write engine for MXF-family track files.
//!
//! ```no_run
//! use std::sync::Arc;
//! use trackfile::{essence::ProResAdapter, storage::MemoryStorage, Rational, ReadContext};
//! use trackfile::{TrackFileReader, TrackFileWriter, WriterConfig, WriterInfo};
//!
//! let mem = MemoryStorage::new();
//! let mut w = TrackFileWriter::new();
//! w.open_write(&mem, "clip.mxf", WriterInfo::default(), Arc::new(ProResAdapter::default()),
//!              Rational::new(24, 1), WriterConfig::default(), None)?;
//! w.write_frame(&trackfile::essence::prores_test_frame(1024, 0))?;
//! w.finalize()?;
//!
//! let mut r = TrackFileReader::new(Arc::new(mem), Arc::new(ProResAdapter::default()));
//! r.open_read("clip.mxf")?;
//! let frame = r.read_frame(0, ReadContext::none())?;
//! assert_eq!(frame.data.len(), 1024);
//! # Ok::<(), trackfile::Error>(())
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod essence;
pub mod index;
pub mod info;
pub mod klv;
pub mod label;
pub mod metadata;
pub mod partition;
pub mod rip;
pub mod storage;
pub mod track;

pub use config::{IndexPlacement, WriterConfig};
pub use crypto::{EncryptionContext, FrameCipher, KeyedHash, MacState};
pub use error::{Error, Result};
pub use essence::EssenceAdapter;
pub use info::WriterInfo;
pub use label::Label;
pub use metadata::{HeaderMetadata, Rational};
pub use track::{
    Frame, FrameBuffer, FrameOptions, FrameStatus, ReadContext, TrackFileReader, TrackFileWriter,
    WriterState,
};
