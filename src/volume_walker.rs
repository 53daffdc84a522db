//! Volume walker - drives the block reader and parsers sequentially through
//! one volume, producing an ordered list of [`ParsedBlock`] records.
//!
//! Walkers share nothing and may be run concurrently across volumes
//! (`spec.md` §4.3, §5).

use crate::block_reader::BlockReader;
use crate::error::{RarError, Result};
use crate::file_media::FileMedia;
use crate::parsing::file_header::FILE_HEADER_TYPE;
use crate::parsing::{ArchiveHeaderParser, FileHeaderParser, MarkerHeaderParser, RarVersion};
use std::sync::Arc;

/// RAR4 end-of-archive header type code.
const END_OF_ARCHIVE_TYPE: u8 = 0x7B;
/// RAR4 archive header type code.
const ARCHIVE_HEADER_TYPE: u8 = 0x73;

/// The closed set of RAR4 block kinds. No open hierarchy is needed: the
/// block set is fixed by the format (Design Note §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Marker,
    ArchiveHeader,
    FileHeader,
    SubBlock,
    EndOfArchive,
    Unknown,
}

/// One parsed structural record from a volume.
#[derive(Debug, Clone)]
pub struct ParsedBlock {
    pub kind: BlockKind,
    pub volume_index: usize,
    pub absolute_offset: u64,
    pub header_size: u64,
    pub data_size: u64,
    pub flags: u16,
    /// Set when this block's declared size overran the volume and its
    /// `data_size` was clipped to the bytes actually available.
    pub truncated: bool,
    /// Populated only for `BlockKind::FileHeader`.
    pub file_header: Option<crate::parsing::file_header::FileHeader>,
}

impl ParsedBlock {
    pub fn total_size(&self) -> u64 {
        self.header_size + self.data_size
    }
}

/// Drives one volume's [`BlockReader`] through marker, archive header, and
/// the file-header loop, producing an ordered [`ParsedBlock`] list.
pub struct VolumeWalker {
    volume_index: usize,
    reader: BlockReader,
    volume_length: u64,
}

impl VolumeWalker {
    pub fn new(volume_index: usize, media: Arc<dyn FileMedia>) -> Self {
        let volume_length = media.length();
        Self {
            volume_index,
            reader: BlockReader::new(media),
            volume_length,
        }
    }

    /// Walk the entire volume. Returns the blocks parsed before any
    /// unrecoverable condition (RAR5 marker, missing marker on volume 0,
    /// or a hard parse error). A declared block size that would overrun the
    /// volume is reported via the returned `Vec<RarError>` warnings and
    /// stops the walk, keeping prior blocks.
    pub async fn walk(mut self) -> Result<(Vec<ParsedBlock>, Vec<RarError>)> {
        let mut blocks = Vec::new();
        let mut warnings = Vec::new();

        let marker_buf = self.reader.read_exact(0, 8.min(self.volume_length)).await?;
        let marker = MarkerHeaderParser::parse(&marker_buf)?;
        if marker.version == RarVersion::Rar5 {
            return Err(RarError::Rar5Unsupported);
        }

        let mut offset = marker.size as u64;
        blocks.push(ParsedBlock {
            kind: BlockKind::Marker,
            volume_index: self.volume_index,
            absolute_offset: 0,
            header_size: offset,
            data_size: 0,
            flags: marker.flags,
            truncated: false,
            file_header: None,
        });

        loop {
            if offset >= self.volume_length {
                break;
            }

            let prefix_len = 7u64.min(self.volume_length - offset);
            let prefix = self.reader.peek(offset, prefix_len).await?;
            if prefix.len() < 3 {
                warnings.push(RarError::TruncatedBlock {
                    volume_index: self.volume_index,
                    offset,
                });
                break;
            }
            let header_type = prefix[2];

            match header_type {
                ARCHIVE_HEADER_TYPE => {
                    let size = ArchiveHeaderParser::HEADER_SIZE as u64;
                    if offset + size > self.volume_length {
                        warnings.push(RarError::TruncatedBlock {
                            volume_index: self.volume_index,
                            offset,
                        });
                        break;
                    }
                    let buf = self.reader.read_exact(offset, size).await?;
                    let header = ArchiveHeaderParser::parse(&buf)?;
                    let declared_size = if header.size == 0 {
                        ArchiveHeaderParser::HEADER_SIZE as u64
                    } else {
                        header.size as u64
                    };
                    blocks.push(ParsedBlock {
                        kind: BlockKind::ArchiveHeader,
                        volume_index: self.volume_index,
                        absolute_offset: offset,
                        header_size: declared_size,
                        data_size: 0,
                        flags: header.flags,
                        truncated: false,
                        file_header: None,
                    });
                    offset += declared_size;
                }
                FILE_HEADER_TYPE => {
                    let available = self.volume_length - offset;
                    let read_len = (FileHeaderParser::HEADER_SIZE as u64).min(available);
                    let buf = self.reader.read_exact(offset, read_len).await?;
                    let header = match FileHeaderParser::parse(&buf) {
                        Ok(h) => h,
                        Err(_) => {
                            warnings.push(RarError::TruncatedBlock {
                                volume_index: self.volume_index,
                                offset,
                            });
                            break;
                        }
                    };
                    let total = header.head_size as u64 + header.packed_size;
                    let truncated = offset + total > self.volume_length;
                    let data_size = if truncated {
                        available.saturating_sub(header.head_size as u64)
                    } else {
                        header.packed_size
                    };
                    if truncated {
                        warnings.push(RarError::TruncatedBlock {
                            volume_index: self.volume_index,
                            offset,
                        });
                    }
                    blocks.push(ParsedBlock {
                        kind: BlockKind::FileHeader,
                        volume_index: self.volume_index,
                        absolute_offset: offset,
                        header_size: header.head_size as u64,
                        data_size,
                        flags: header.flags,
                        truncated,
                        file_header: Some(header),
                    });
                    if truncated {
                        break;
                    }
                    offset += total;
                }
                END_OF_ARCHIVE_TYPE => {
                    blocks.push(ParsedBlock {
                        kind: BlockKind::EndOfArchive,
                        volume_index: self.volume_index,
                        absolute_offset: offset,
                        header_size: 7,
                        data_size: 0,
                        flags: 0,
                        truncated: false,
                        file_header: None,
                    });
                    break;
                }
                0x75..=0x7A => {
                    let size_bytes = if prefix.len() >= 7 {
                        u16::from_le_bytes([prefix[5], prefix[6]]) as u64
                    } else {
                        0
                    };
                    let size = size_bytes.max(7);
                    if offset + size > self.volume_length {
                        warnings.push(RarError::TruncatedBlock {
                            volume_index: self.volume_index,
                            offset,
                        });
                        break;
                    }
                    blocks.push(ParsedBlock {
                        kind: BlockKind::SubBlock,
                        volume_index: self.volume_index,
                        absolute_offset: offset,
                        header_size: size,
                        data_size: 0,
                        flags: 0,
                        truncated: false,
                        file_header: None,
                    });
                    offset += size;
                }
                _ => {
                    blocks.push(ParsedBlock {
                        kind: BlockKind::Unknown,
                        volume_index: self.volume_index,
                        absolute_offset: offset,
                        header_size: 0,
                        data_size: 0,
                        flags: 0,
                        truncated: false,
                        file_header: None,
                    });
                    break;
                }
            }
        }

        Ok((blocks, warnings))
    }
}
