//! Fixed on-disk record header and the type codes records carry.
//!
//! Mirrors the `_RingItemHeader` / ring-item type constants described in
//! the analysis pipeline's record format: a self-inclusive size, a type
//! code, and a legacy extension field that is always 4 and otherwise
//! unused (see DESIGN.md open-question notes).

use std::io::{self, Read, Write};

/// Size in bytes of a serialized [`RecordHeader`].
pub const RECORD_HEADER_BYTES: usize = 12;

/// Fixed value of the legacy header-extension field. Carried for wire
/// compatibility; never interpreted by this crate.
pub const HEADER_EXTENSION_BYTES: u32 = 4;

/// Highest `type_code` treated as an opaque passthrough record.
pub const LAST_PASSTHROUGH: u32 = 32767;
/// Parameter-definition table record.
pub const PARAMETER_DEFINITIONS: u32 = 32768;
/// Variable-value table record.
pub const VARIABLE_VALUES: u32 = 32769;
/// One trigger's worth of parameter assignments.
pub const PARAMETER_DATA: u32 = 32770;

/// `(total_size_bytes, type_code, header_extension_size)`, the fixed
/// front-matter of every on-disk record. `total_size` is self-inclusive:
/// it counts the header bytes themselves plus the body that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub total_size: u32,
    pub type_code: u32,
    pub header_extension: u32,
}

impl RecordHeader {
    pub fn new(total_size: u32, type_code: u32) -> Self {
        Self { total_size, type_code, header_extension: HEADER_EXTENSION_BYTES }
    }

    pub fn is_passthrough(&self) -> bool {
        self.type_code <= LAST_PASSTHROUGH
    }

    /// Parse a header from its 12-byte little-endian wire form.
    pub fn decode(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < RECORD_HEADER_BYTES {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short record header"));
        }
        let total_size = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let type_code = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let header_extension = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        Ok(Self { total_size, type_code, header_extension })
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; RECORD_HEADER_BYTES];
        r.read_exact(&mut buf)?;
        Self::decode(&buf)
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_BYTES] {
        let mut buf = [0u8; RECORD_HEADER_BYTES];
        buf[0..4].copy_from_slice(&self.total_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.type_code.to_le_bytes());
        buf[8..12].copy_from_slice(&self.header_extension.to_le_bytes());
        buf
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.encode())
    }
}
