//! File header parser.
//!
//! Each file in a RAR archive has a file header that describes
//! the file's name, size, compression method, etc.

use crate::error::{RarError, Result};

/// File header type constant.
pub const FILE_HEADER_TYPE: u8 = 0x74; // 116

#[derive(Debug, Clone)]
pub struct FileHeader {
    pub crc: u16,
    pub header_type: u8,
    pub flags: u16,
    pub head_size: u16,
    pub packed_size: u64,
    pub unpacked_size: u64,
    pub host_os: u8,
    pub file_crc: u32,
    pub timestamp: u32,
    pub version: u8,
    pub method: u8,
    pub name_size: u16,
    pub attributes: u32,
    pub name: String,
    // Parsed flags
    pub continues_from_previous: bool,
    pub continues_in_next: bool,
    pub is_encrypted: bool,
    pub has_comment: bool,
    pub has_info_from_previous: bool,
    pub has_high_size: bool,
    pub has_special_name: bool,
    pub has_salt: bool,
    pub is_old_version: bool,
    pub has_extended_time: bool,
}

pub struct FileHeaderParser;

impl FileHeaderParser {
    /// Maximum header size to read (includes variable-length filename).
    pub const HEADER_SIZE: usize = 280;
    /// Minimum fixed header size before filename.
    const MIN_HEADER_SIZE: usize = 32;

    pub fn parse(buffer: &[u8]) -> Result<FileHeader> {
        if buffer.len() < Self::MIN_HEADER_SIZE {
            return Err(RarError::BufferTooSmall {
                needed: Self::MIN_HEADER_SIZE,
                have: buffer.len(),
            });
        }

        let mut offset = 0;

        let crc = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
        offset += 2;

        let header_type = buffer[offset];
        offset += 1;

        let flags = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
        offset += 2;

        let head_size = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
        offset += 2;

        let mut packed_size = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]) as u64;
        offset += 4;

        let mut unpacked_size = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]) as u64;
        offset += 4;

        let host_os = buffer[offset];
        offset += 1;

        let file_crc = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]);
        offset += 4;

        let timestamp = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]);
        offset += 4;

        let version = buffer[offset];
        offset += 1;

        let method = buffer[offset];
        offset += 1;

        let name_size = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
        offset += 2;

        let attributes = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]);
        offset += 4;

        // Parse flags
        let continues_from_previous = (flags & 0x01) != 0;
        let continues_in_next = (flags & 0x02) != 0;
        let is_encrypted = (flags & 0x04) != 0;
        let has_comment = (flags & 0x08) != 0;
        let has_info_from_previous = (flags & 0x10) != 0;
        let has_high_size = (flags & 0x100) != 0;
        let has_special_name = (flags & 0x200) != 0;
        let has_salt = (flags & 0x400) != 0;
        let is_old_version = (flags & 0x800) != 0;
        let has_extended_time = (flags & 0x1000) != 0;

        // Handle 64-bit sizes
        if has_high_size {
            if buffer.len() < offset + 8 {
                return Err(RarError::BufferTooSmall {
                    needed: offset + 8,
                    have: buffer.len(),
                });
            }
            let high_packed = u32::from_le_bytes([
                buffer[offset],
                buffer[offset + 1],
                buffer[offset + 2],
                buffer[offset + 3],
            ]) as u64;
            offset += 4;
            let high_unpacked = u32::from_le_bytes([
                buffer[offset],
                buffer[offset + 1],
                buffer[offset + 2],
                buffer[offset + 3],
            ]) as u64;
            offset += 4;

            packed_size |= high_packed << 32;
            unpacked_size |= high_unpacked << 32;
        }

        // Parse filename (and, if has_special_name, the Unicode blob packed
        // into the same nameSize-length field after a NUL separator).
        let name_end = offset + name_size as usize;
        if buffer.len() < name_end {
            return Err(RarError::BufferTooSmall {
                needed: name_end,
                have: buffer.len(),
            });
        }
        let raw_name = &buffer[offset..name_end];
        let name = if has_special_name {
            decode_unicode_name(raw_name)
        } else {
            String::from_utf8_lossy(raw_name).to_string()
        };

        Ok(FileHeader {
            crc,
            header_type,
            flags,
            head_size,
            packed_size,
            unpacked_size,
            host_os,
            file_crc,
            timestamp,
            version,
            method,
            name_size,
            attributes,
            name,
            continues_from_previous,
            continues_in_next,
            is_encrypted,
            has_comment,
            has_info_from_previous,
            has_high_size,
            has_special_name,
            has_salt,
            is_old_version,
            has_extended_time,
        })
    }
}

/// Decode a RAR4 compressed-Unicode filename blob.
///
/// The field is laid out as `narrow_name '\0' high_byte encoded...`: a
/// NUL-terminated MBCS fallback name, one "high byte" value, then a run of
/// flag bytes each describing four characters (2 bits each):
///
/// - `00` — next byte is a literal low byte, high byte is `0`.
/// - `01` — next byte is a literal low byte, high byte is `high_byte`.
/// - `10` — next two bytes are a little-endian `u16` code point, taken as-is.
/// - `11` — next byte is a run length `n`. If its top bit is set, the
///   following byte is a correction added (mod 256) to each of the next
///   `(n & 0x7f) + 2` narrow-name bytes, combined with `high_byte` as the
///   high byte; otherwise the next `n + 2` narrow-name bytes are copied
///   through verbatim as low bytes with high byte `0`.
fn decode_unicode_name(field: &[u8]) -> String {
    let Some(sep) = field.iter().position(|&b| b == 0) else {
        return String::from_utf8_lossy(field).to_string();
    };
    let narrow = &field[..sep];
    let encoded = &field[sep + 1..];

    if encoded.is_empty() {
        return String::from_utf8_lossy(narrow).to_string();
    }

    let high_byte = encoded[0] as u32;
    let mut enc_pos = 1usize;
    let mut narrow_pos = 0usize;
    let mut out: Vec<u16> = Vec::with_capacity(narrow.len());

    'outer: while enc_pos < encoded.len() {
        let flags = encoded[enc_pos];
        enc_pos += 1;

        for shift in [6u8, 4, 2, 0] {
            let bits = (flags >> shift) & 0x03;
            match bits {
                0 => {
                    let Some(&b) = encoded.get(enc_pos) else {
                        break 'outer;
                    };
                    enc_pos += 1;
                    out.push(b as u16);
                }
                1 => {
                    let Some(&b) = encoded.get(enc_pos) else {
                        break 'outer;
                    };
                    enc_pos += 1;
                    out.push(((high_byte << 8) | b as u32) as u16);
                }
                2 => {
                    if enc_pos + 1 >= encoded.len() {
                        break 'outer;
                    }
                    let code = u16::from_le_bytes([encoded[enc_pos], encoded[enc_pos + 1]]);
                    enc_pos += 2;
                    out.push(code);
                }
                3 => {
                    let Some(&len_byte) = encoded.get(enc_pos) else {
                        break 'outer;
                    };
                    enc_pos += 1;
                    if len_byte & 0x80 != 0 {
                        let Some(&correction) = encoded.get(enc_pos) else {
                            break 'outer;
                        };
                        enc_pos += 1;
                        let count = (len_byte & 0x7f) as usize + 2;
                        for _ in 0..count {
                            let b = narrow.get(narrow_pos).copied().unwrap_or(0);
                            narrow_pos += 1;
                            let combined = (b.wrapping_add(correction)) as u32;
                            out.push(((high_byte << 8) | combined) as u16);
                        }
                    } else {
                        let count = len_byte as usize + 2;
                        for _ in 0..count {
                            let b = narrow.get(narrow_pos).copied().unwrap_or(0);
                            narrow_pos += 1;
                            out.push(b as u16);
                        }
                    }
                }
                _ => unreachable!(),
            }
        }
    }

    if out.is_empty() {
        String::from_utf8_lossy(narrow).to_string()
    } else {
        String::from_utf16_lossy(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_header() {
        // Minimal file header with a 4-byte filename "test"
        let mut buffer = vec![0u8; 36];
        buffer[2] = FILE_HEADER_TYPE; // type
        buffer[5] = 36; // head_size low byte
        buffer[26] = 4; // name_size = 4
        buffer[32] = b't';
        buffer[33] = b'e';
        buffer[34] = b's';
        buffer[35] = b't';

        let header = FileHeaderParser::parse(&buffer).unwrap();
        assert_eq!(header.header_type, FILE_HEADER_TYPE);
        assert_eq!(header.name, "test");
    }

    #[test]
    fn test_compression_method() {
        let mut buffer = vec![0u8; 36];
        buffer[2] = FILE_HEADER_TYPE;
        buffer[5] = 36;
        buffer[25] = 0x30; // method = Store (no compression) - at offset 25
        buffer[26] = 4; // name_size low byte
        buffer[32..36].copy_from_slice(b"test");

        let header = FileHeaderParser::parse(&buffer).unwrap();
        assert_eq!(header.method, 0x30); // Store method
    }

    #[test]
    fn test_truncated_name_is_buffer_too_small() {
        let mut buffer = vec![0u8; 36];
        buffer[2] = FILE_HEADER_TYPE;
        buffer[5] = 36;
        buffer[26] = 10; // claims a 10-byte name but buffer only has 4
        buffer[32..36].copy_from_slice(b"test");

        assert!(matches!(
            FileHeaderParser::parse(&buffer),
            Err(RarError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_decode_unicode_name_falls_back_to_ascii_without_nul() {
        // No NUL separator present: treated as a plain ASCII name.
        assert_eq!(decode_unicode_name(b"plain.txt"), "plain.txt");
    }

    #[test]
    fn test_decode_unicode_name_literal_run() {
        // narrow="ab", high_byte=0x00, one flag byte of all `00` -> two literal lows 'a','b'
        let mut field = b"ab\0".to_vec();
        field.push(0x00); // high_byte
        field.push(0b0000_0000); // flags: four `00` groups
        field.push(b'a');
        field.push(b'b');
        assert_eq!(decode_unicode_name(&field), "ab");
    }

    #[test]
    fn test_decode_unicode_name_copy_run_from_narrow() {
        // narrow="hi", encoded: high_byte=0, flags byte selecting `11` (copy-run) first group,
        // length byte = 0 (count = 2, plain copy, no correction).
        let mut field = b"hi\0".to_vec();
        field.push(0x00); // high_byte
        field.push(0b1100_0000); // first group = 11 (copy run), rest unused
        field.push(0x00); // length byte, top bit clear -> count = 0 + 2 = 2
        assert_eq!(decode_unicode_name(&field), "hi");
    }
}
