//! # rar-stream
//!
//! Streaming access to the inner files of a (possibly multi-volume) RAR
//! archive, without materializing the whole archive in memory and without
//! requiring every volume to be fully downloaded up front.
//!
//! A consumer supplies one random-access byte source per volume; the
//! library parses archive metadata, reconstructs each logical inner file
//! from the chunks that back it across volumes, and serves arbitrary
//! `[start, end]` byte intervals of that logical file as a lazy,
//! backpressure-respecting stream.
//!
//! ## Scope
//!
//! This crate parses the RAR4 (1.5-4.x) block format and detects, but does
//! not parse, RAR5 archives. It never decompresses or decrypts: for the
//! stored method the bytes it streams are the file's original bytes; for
//! compressed methods it streams the packed bytes unchanged, for an
//! external decoder to wrap.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  FileMedia (your byte source: local file, HTTP, torrent)  │
//! ├──────────────────────────────────────────────────────────┤
//! │  BlockReader           - buffered window over one volume  │
//! │  parsing::*            - pure block decoders               │
//! │  VolumeWalker          - drives B+C through one volume    │
//! │  BundleAssembler       - stitches chunks into InnerFiles  │
//! │  InnerFile/InnerFileStream - seek + range-to-stream        │
//! ├──────────────────────────────────────────────────────────┤
//! │  RarFilesPackage       - parse() facade, idempotent cache  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use rar_stream::{RarFilesPackage, ParseOptions, LocalFileMedia, FileMedia};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file: Arc<dyn FileMedia> = Arc::new(LocalFileMedia::new("archive.rar")?);
//!     let package = RarFilesPackage::new(vec![file]);
//!
//!     let files = package.parse(ParseOptions::default()).await?;
//!     for f in &files {
//!         println!("{}: {} bytes (complete: {})", f.name, f.length, f.complete);
//!     }
//!
//!     let content = files[0].read_to_end().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! All operations return [`Result<T, RarError>`]. See [`RarError`] for the
//! full set of non-fatal (recorded as warnings) and fatal error kinds.
//!
//! ## Module overview
//!
//! - [`error`] - error types for all operations
//! - [`parsing`] - pure RAR4 block decoders, plus RAR5 marker detection
//! - [`formats`] - low-level format constants and timestamp conversion
//! - `block_reader`, `volume_walker`, `bundle_assembler`, `inner_file`,
//!   `rar_file_chunk`, `rar_files_package` - the pipeline described above,
//!   available under the `async` feature

mod crc32;
pub mod error;
mod file_media;
pub mod formats;
pub mod parsing;

// The streaming pipeline is built on the async FileMedia trait.
#[cfg(feature = "async")]
mod block_reader;
#[cfg(feature = "async")]
mod bundle_assembler;
#[cfg(feature = "async")]
mod inner_file;
#[cfg(feature = "async")]
mod rar_file_chunk;
#[cfg(feature = "async")]
mod rar_files_package;
#[cfg(feature = "async")]
mod volume_walker;

pub use error::RarError;
pub use file_media::{LocalFileMedia, ReadInterval};

#[cfg(feature = "async")]
pub use block_reader::{BlockReader, DEFAULT_BUFFER_SIZE};
#[cfg(feature = "async")]
pub use file_media::FileMedia;
#[cfg(feature = "async")]
pub use inner_file::{ChunkMapEntry, InnerFile, InnerFileStream, StreamChunkInfo};
#[cfg(feature = "async")]
pub use rar_file_chunk::RarFileChunk;
#[cfg(feature = "async")]
pub use rar_files_package::{ArchiveInfo, ParseEvent, ParseOptions, RarFilesPackage};
#[cfg(feature = "async")]
pub use volume_walker::{BlockKind, ParsedBlock, VolumeWalker};
