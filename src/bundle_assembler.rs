//! Bundle assembler - merges per-volume block lists into a cross-volume
//! chunk graph keyed by inner-file identity (`spec.md` §4.4).

use crate::error::RarError;
use crate::inner_file::InnerFile;
use crate::rar_file_chunk::RarFileChunk;
use crate::volume_walker::{BlockKind, ParsedBlock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::file_media::FileMedia;

/// One inner file still being stitched together across volumes.
struct OpenFile {
    name: String,
    method: u8,
    unpacked_size: u64,
    chunks: Vec<RarFileChunk>,
    is_continuation: Vec<bool>,
    closed: bool,
    truncated: bool,
}

/// Implements `spec.md` §4.4 steps 2-4 over blocks already presented in
/// canonical volume order.
pub struct BundleAssembler {
    max_files: Option<usize>,
}

impl BundleAssembler {
    pub fn new(max_files: Option<usize>) -> Self {
        Self { max_files }
    }

    /// `volumes` must already be in canonical order (§4.4 step 1) and
    /// `blocks_per_volume[i]` must be the `ParsedBlock`s produced by walking
    /// `volumes[i]`.
    pub fn assemble(
        &self,
        volumes: &[Arc<dyn FileMedia>],
        blocks_per_volume: &[Vec<ParsedBlock>],
        filter: Option<&(dyn Fn(&str, usize) -> bool + Send + Sync)>,
    ) -> (Vec<InnerFile>, Vec<RarError>) {
        let mut open: HashMap<String, OpenFile> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut warnings = Vec::new();
        let mut seen_count = 0usize;

        for (volume_index, blocks) in blocks_per_volume.iter().enumerate() {
            let media = &volumes[volume_index];
            for block in blocks {
                if block.kind != BlockKind::FileHeader {
                    continue;
                }
                let header = block.file_header.as_ref().expect("file header block");
                let name = header.name.clone();

                let data_start = block.absolute_offset + block.header_size;
                let data_end = if block.data_size > 0 {
                    data_start + block.data_size - 1
                } else {
                    data_start
                };
                let chunk = RarFileChunk::new(
                    Arc::clone(media),
                    data_start,
                    data_end,
                    header.continues_from_previous,
                );

                if !header.continues_from_previous {
                    if let Some(f) = &self.filter_excludes(filter, &name, seen_count) {
                        if *f {
                            continue;
                        }
                    }
                    seen_count += 1;
                    if let Some(max) = self.max_files {
                        if order.len() >= max && !open.contains_key(&name) {
                            continue;
                        }
                    }
                    let entry = OpenFile {
                        name: name.clone(),
                        method: header.method,
                        unpacked_size: header.unpacked_size,
                        chunks: vec![chunk],
                        is_continuation: vec![false],
                        closed: !header.continues_in_next,
                        truncated: block.truncated,
                    };
                    order.push(name.clone());
                    open.insert(name, entry);
                } else {
                    match open.get_mut(&name) {
                        Some(entry) if !entry.closed => {
                            entry.chunks.push(chunk);
                            entry.is_continuation.push(true);
                            entry.truncated |= block.truncated;
                            if !header.continues_in_next {
                                entry.closed = true;
                            }
                        }
                        _ => {
                            warnings.push(RarError::DanglingContinuation {
                                name: name.clone(),
                                volume_index,
                            });
                            let entry = OpenFile {
                                name: name.clone(),
                                method: header.method,
                                unpacked_size: header.unpacked_size,
                                chunks: vec![chunk],
                                is_continuation: vec![true],
                                closed: !header.continues_in_next,
                                truncated: block.truncated,
                            };
                            order.push(name.clone());
                            open.insert(name, entry);
                        }
                    }
                }
            }
        }

        let mut files = Vec::with_capacity(order.len());
        for name in order {
            let Some(entry) = open.remove(&name) else {
                continue;
            };
            let has_head = entry.is_continuation.first() == Some(&false);
            let complete = has_head && entry.closed && !entry.truncated;
            let inner = InnerFile::new(
                entry.name,
                entry.chunks,
                entry.method,
                entry.unpacked_size,
                complete,
            );
            files.push(inner);
        }

        (files, warnings)
    }

    fn filter_excludes(
        &self,
        filter: Option<&(dyn Fn(&str, usize) -> bool + Send + Sync)>,
        name: &str,
        index: usize,
    ) -> Option<bool> {
        filter.map(|f| !f(name, index))
    }
}

/// Canonical volume ordering (`spec.md` §4.4 step 1): an explicit
/// `isFirstVolume` flag wins; otherwise `.rar`/`.r00`/`.r01`/`.partNN.rar`
/// naming, falling back to caller order and lexicographic ties.
pub fn volume_order_key(name: &str) -> (u32, String) {
    let lower = name.to_lowercase();
    if lower.ends_with(".rar") {
        if let Some(part) = extract_part_number(&lower) {
            return (part, lower);
        }
        (0, lower)
    } else {
        let ext = lower.rsplit('.').next().unwrap_or("");
        if ext.len() == 3 && ext.starts_with('r') {
            match ext[1..].parse::<u32>() {
                Ok(n) => (n + 1, lower),
                Err(_) => (1000, lower),
            }
        } else {
            (1000, lower)
        }
    }
}

/// Extracts `N` from a `.partN.rar` style name, else `None`.
fn extract_part_number(lower_name: &str) -> Option<u32> {
    let stem = lower_name.strip_suffix(".rar")?;
    let part_pos = stem.rfind(".part")?;
    stem[part_pos + 5..].parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_order_prefers_rar_then_numbered_parts() {
        let mut names = vec!["archive.r01", "archive.rar", "archive.r00"];
        names.sort_by_key(|n| volume_order_key(n));
        assert_eq!(names, vec!["archive.rar", "archive.r00", "archive.r01"]);
    }

    #[test]
    fn volume_order_handles_part_naming() {
        let mut names = vec!["a.part2.rar", "a.part1.rar", "a.part10.rar"];
        names.sort_by_key(|n| volume_order_key(n));
        assert_eq!(names, vec!["a.part1.rar", "a.part2.rar", "a.part10.rar"]);
    }
}
