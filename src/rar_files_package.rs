//! Multi-volume RAR archive parser.
//!
//! This module provides the main entry point for parsing RAR archives.
//! The [`RarFilesPackage`] struct handles single and multi-volume archives,
//! automatically stitching files that span multiple volumes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rar_stream::{RarFilesPackage, ParseOptions, LocalFileMedia, FileMedia};
//! use std::sync::Arc;
//!
//! // Open a single RAR file
//! let file: Arc<dyn FileMedia> = Arc::new(LocalFileMedia::new("archive.rar")?);
//! let package = RarFilesPackage::new(vec![file]);
//!
//! // Parse with default options
//! let files = package.parse(ParseOptions::default()).await?;
//!
//! // Read file content
//! let content = files[0].read_to_end().await?;
//! ```
//!
//! ## Multi-Volume Archives
//!
//! For split archives, provide all volumes; order does not matter as long
//! as their names follow the `.rar`/`.r00`/`.r01`/`.partNN.rar` convention
//! or one volume's archive header declares `isFirstVolume` ([`ArchiveInfo`]).
//!
//! ```rust,ignore
//! let volumes: Vec<Arc<dyn FileMedia>> = vec![
//!     Arc::new(LocalFileMedia::new("archive.part1.rar")?),
//!     Arc::new(LocalFileMedia::new("archive.part2.rar")?),
//!     Arc::new(LocalFileMedia::new("archive.part3.rar")?),
//! ];
//! let package = RarFilesPackage::new(volumes);
//! let files = package.parse(ParseOptions::default()).await?;
//! ```
//!
//! ## Filtering Files
//!
//! ```rust,ignore
//! let opts = ParseOptions {
//!     filter: Some(Box::new(|name, _index| name.ends_with(".txt"))),
//!     max_files: Some(10),
//! };
//! let txt_files = package.parse(opts).await?;
//! ```

use crate::bundle_assembler::{volume_order_key, BundleAssembler};
use crate::error::{RarError, Result};
use crate::file_media::FileMedia;
use crate::inner_file::InnerFile;
use crate::parsing::RarVersion;
use crate::volume_walker::VolumeWalker;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Archive metadata returned by [`RarFilesPackage::get_archive_info`].
///
/// All fields are read from the archive header of the canonical first
/// volume without reading any file's packed bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Whether the archive has a recovery record for error correction.
    pub has_recovery_record: bool,
    /// Whether the archive uses solid compression (files must be read in order).
    pub is_solid: bool,
    /// Whether the archive is locked (cannot be modified by RAR tools).
    pub is_locked: bool,
    /// Whether the archive is split across multiple volumes.
    pub is_multivolume: bool,
    /// Whether block contents are flagged encoded in the archive header.
    pub has_encrypted_headers: bool,
    /// RAR format version of the canonical first volume.
    pub version: Option<RarVersion>,
}

/// Options for parsing RAR archives (`spec.md` §6 Package API).
#[derive(Default)]
pub struct ParseOptions {
    /// Filter function: return `true` to include a file.
    ///
    /// Receives the file name and its 0-based index in canonical emission
    /// order. Only evaluated for head chunks (continuation chunks always
    /// join whatever file is already open).
    pub filter: Option<Box<dyn Fn(&str, usize) -> bool + Send + Sync>>,

    /// Maximum number of inner files to return. Excess files are discarded
    /// after chunk stitching, per `spec.md` §4.7.
    pub max_files: Option<usize>,

    /// Optional progress callback, fired `ParsingStart` once, then
    /// `FileParsed` for each inner file in canonical emission order, then
    /// `ParsingComplete` once, all before `parse()` returns. Not fired on
    /// subsequent idempotent calls that hit the cache.
    pub on_event: Option<Box<dyn Fn(ParseEvent) + Send + Sync>>,
}

/// Progress events fired by [`RarFilesPackage::parse`] as it walks volumes
/// and stitches inner files (`spec.md` §4.7).
pub enum ParseEvent<'a> {
    /// Fired once, before any volume is walked.
    ParsingStart,
    /// Fired once per inner file, in canonical emission order.
    FileParsed(&'a InnerFile),
    /// Fired once, after every inner file has been assembled.
    ParsingComplete(&'a [InnerFile]),
}

struct ParsedArchive {
    inner_files: Vec<InnerFile>,
    warnings: Vec<RarError>,
    archive_info: ArchiveInfo,
}

/// Entry point for parsing a (possibly multi-volume) RAR archive.
///
/// `parse` is idempotent: the first call's options determine the result,
/// and every subsequent call returns the cached `InnerFile` list regardless
/// of the options passed (`spec.md` §4.7).
pub struct RarFilesPackage {
    files: Vec<Arc<dyn FileMedia>>,
    cache: OnceCell<ParsedArchive>,
}

impl RarFilesPackage {
    pub fn new(files: Vec<Arc<dyn FileMedia>>) -> Self {
        Self {
            files,
            cache: OnceCell::new(),
        }
    }

    /// Parse the archive, returning its inner files in canonical volume
    /// order. Non-fatal issues (truncated trailing blocks, dangling
    /// continuations) are reflected in affected `InnerFile::complete` flags
    /// and discarded here; use [`Self::warnings`] after a parse to inspect
    /// them.
    pub async fn parse(&self, opts: ParseOptions) -> Result<Vec<InnerFile>> {
        let parsed = self
            .cache
            .get_or_try_init(|| self.parse_uncached(opts))
            .await?;
        Ok(parsed.inner_files.clone())
    }

    /// Non-fatal warnings recorded by the most recent parse. Empty before
    /// the first call to [`Self::parse`].
    pub fn warnings(&self) -> &[RarError] {
        self.cache
            .get()
            .map(|p| p.warnings.as_slice())
            .unwrap_or(&[])
    }

    /// Archive-level metadata. Triggers a parse if one hasn't happened yet.
    pub async fn get_archive_info(&self) -> Result<ArchiveInfo> {
        let parsed = self
            .cache
            .get_or_try_init(|| self.parse_uncached(ParseOptions::default()))
            .await?;
        Ok(parsed.archive_info.clone())
    }

    async fn parse_uncached(&self, opts: ParseOptions) -> Result<ParsedArchive> {
        if self.files.is_empty() {
            return Err(RarError::NoFilesFound);
        }

        if let Some(on_event) = &opts.on_event {
            on_event(ParseEvent::ParsingStart);
        }

        // `spec.md` §5 allows walkers to run concurrently since they share
        // nothing; each is spawned as its own task so slow volumes don't
        // block the others.
        let handles: Vec<_> = self
            .files
            .iter()
            .enumerate()
            .map(|(i, media)| {
                let media = Arc::clone(media);
                tokio::spawn(async move { VolumeWalker::new(i, media).walk().await })
            })
            .collect();

        let mut blocks_by_caller_index = Vec::with_capacity(self.files.len());
        let mut warnings = Vec::new();
        for handle in handles {
            let (blocks, mut volume_warnings) = handle
                .await
                .map_err(|e| RarError::ParseError(format!("volume walker task panicked: {e}")))??;
            warnings.append(&mut volume_warnings);
            blocks_by_caller_index.push(blocks);
        }

        let is_first_volume: Vec<bool> = blocks_by_caller_index
            .iter()
            .map(|blocks| {
                blocks.iter().any(|b| {
                    b.kind == crate::volume_walker::BlockKind::ArchiveHeader
                        && (b.flags & 0x0100) != 0
                })
            })
            .collect();
        let names: Vec<String> = self.files.iter().map(|m| m.name().to_string()).collect();
        let order = canonical_order(&names, &is_first_volume);

        let canonical_volumes: Vec<Arc<dyn FileMedia>> =
            order.iter().map(|&i| Arc::clone(&self.files[i])).collect();
        let canonical_blocks: Vec<_> = order
            .iter()
            .map(|&i| blocks_by_caller_index[i].clone())
            .collect();

        let archive_info = build_archive_info(&canonical_blocks, self.files.len() > 1);

        let assembler = BundleAssembler::new(opts.max_files);
        let filter = opts.filter.as_deref();
        let (inner_files, mut assembly_warnings) =
            assembler.assemble(&canonical_volumes, &canonical_blocks, filter);
        warnings.append(&mut assembly_warnings);

        if let Some(on_event) = &opts.on_event {
            for file in &inner_files {
                on_event(ParseEvent::FileParsed(file));
            }
            on_event(ParseEvent::ParsingComplete(&inner_files));
        }

        Ok(ParsedArchive {
            inner_files,
            warnings,
            archive_info,
        })
    }
}

/// `spec.md` §4.4 step 1: an explicit `isFirstVolume` flag wins outright;
/// otherwise volumes sort by RAR naming convention, ties broken by caller
/// order then lexicographic name.
fn canonical_order(names: &[String], is_first_volume: &[bool]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..names.len()).collect();
    idx.sort_by_key(|&i| {
        let declared_first = !is_first_volume.get(i).copied().unwrap_or(false);
        let (weight, _) = volume_order_key(&names[i]);
        (declared_first, weight, i)
    });
    idx
}

fn build_archive_info(
    canonical_blocks: &[Vec<crate::volume_walker::ParsedBlock>],
    is_multivolume: bool,
) -> ArchiveInfo {
    let marker = canonical_blocks
        .first()
        .and_then(|blocks| blocks.first())
        .filter(|b| b.kind == crate::volume_walker::BlockKind::Marker);
    let version = marker.map(|_| RarVersion::Rar4);

    let archive_header_flags = canonical_blocks
        .first()
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.kind == crate::volume_walker::BlockKind::ArchiveHeader)
        })
        .map(|b| b.flags)
        .unwrap_or(0);

    ArchiveInfo {
        has_recovery_record: archive_header_flags & 0x0040 != 0,
        is_solid: archive_header_flags & 0x0008 != 0,
        is_locked: archive_header_flags & 0x0004 != 0,
        is_multivolume,
        has_encrypted_headers: archive_header_flags & 0x0080 != 0,
        version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_media::ReadInterval;
    use std::future::Future;
    use std::pin::Pin;

    struct MockMedia {
        name: String,
        data: Vec<u8>,
    }

    impl FileMedia for MockMedia {
        fn length(&self) -> u64 {
            self.data.len() as u64
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn read_range(
            &self,
            interval: ReadInterval,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>> {
            let start = interval.start as usize;
            let end = (interval.end + 1) as usize;
            let data = self.data[start..end.min(self.data.len())].to_vec();
            Box::pin(async move { Ok(data) })
        }
    }

    fn push_file_header(buf: &mut Vec<u8>, name: &[u8], payload: &[u8], flags: u16) {
        let head_size = 32 + name.len();
        let mut header = vec![0u8; head_size];
        header[2] = crate::parsing::file_header::FILE_HEADER_TYPE;
        header[3..5].copy_from_slice(&flags.to_le_bytes());
        header[5..7].copy_from_slice(&(head_size as u16).to_le_bytes());
        header[7..11].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        header[26..28].copy_from_slice(&(name.len() as u16).to_le_bytes());
        header[25] = 0x30;
        header[32..32 + name.len()].copy_from_slice(name);
        buf.extend_from_slice(&header);
        buf.extend_from_slice(payload);
    }

    fn build_archive(files: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00]);
        let mut archive_header = vec![0u8; 13];
        archive_header[2] = 0x73;
        archive_header[5..7].copy_from_slice(&13u16.to_le_bytes());
        buf.extend_from_slice(&archive_header);
        for (name, payload) in files {
            push_file_header(&mut buf, name, payload, 0);
        }
        buf.extend_from_slice(&[0u8; 7]);
        let len = buf.len();
        buf[len - 5] = 0x7B;
        buf
    }

    #[tokio::test]
    async fn parses_single_volume_three_files() {
        let data = build_archive(&[
            (b"a.txt", &[1u8; 10]),
            (b"b.txt", &[2u8; 20]),
            (b"c.txt", &[3u8; 30]),
        ]);
        let media: Arc<dyn FileMedia> = Arc::new(MockMedia {
            name: "archive.rar".to_string(),
            data,
        });
        let package = RarFilesPackage::new(vec![media]);
        let files = package.parse(ParseOptions::default()).await.unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].name, "a.txt");
        assert_eq!(files[1].name, "b.txt");
        assert_eq!(files[2].name, "c.txt");
        assert!(files.iter().all(|f| f.complete));
    }

    #[tokio::test]
    async fn parse_is_idempotent() {
        let data = build_archive(&[(b"a.txt", &[1u8; 10])]);
        let media: Arc<dyn FileMedia> = Arc::new(MockMedia {
            name: "archive.rar".to_string(),
            data,
        });
        let package = RarFilesPackage::new(vec![media]);
        let first = package.parse(ParseOptions::default()).await.unwrap();
        let second = package
            .parse(ParseOptions {
                max_files: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn parse_fires_lifecycle_events_in_canonical_order() {
        use std::sync::Mutex;

        let data = build_archive(&[(b"a.txt", &[1u8; 4]), (b"b.txt", &[2u8; 4])]);
        let media: Arc<dyn FileMedia> = Arc::new(MockMedia {
            name: "archive.rar".to_string(),
            data,
        });
        let package = RarFilesPackage::new(vec![media]);

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_for_cb = Arc::clone(&seen);
        let opts = ParseOptions {
            on_event: Some(Box::new(move |event| {
                let mut log = seen_for_cb.lock().unwrap();
                match event {
                    ParseEvent::ParsingStart => log.push("start".to_string()),
                    ParseEvent::FileParsed(f) => log.push(format!("file:{}", f.name)),
                    ParseEvent::ParsingComplete(files) => {
                        log.push(format!("complete:{}", files.len()))
                    }
                }
            })),
            ..Default::default()
        };

        package.parse(opts).await.unwrap();
        let log = seen.lock().unwrap();
        assert_eq!(
            *log,
            vec!["start", "file:a.txt", "file:b.txt", "complete:2"]
        );
    }

    #[tokio::test]
    async fn rejects_empty_volume_list() {
        let package = RarFilesPackage::new(vec![]);
        assert!(matches!(
            package.parse(ParseOptions::default()).await,
            Err(RarError::NoFilesFound)
        ));
    }
}
