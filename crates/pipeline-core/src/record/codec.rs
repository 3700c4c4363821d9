//! On-disk body encodings for the three structured record types.
//!
//! Grounded on `AnalysisRingItems.h`'s `ParameterDefinitions`, `VariableItem`
//! and `ParameterItem` ring items. All fields are little-endian and packed;
//! no field is ever trusted to match a platform's `sizeof`/alignment, so
//! every encode/decode here walks the byte buffer field by field.

use std::io;

use super::header::{RecordHeader, PARAMETER_DATA, PARAMETER_DEFINITIONS, VARIABLE_VALUES};

/// Maximum length, in bytes, of a [`Variable`]'s `units` field on disk.
pub const MAX_UNITS_LENGTH: usize = 32;

fn read_cstring(buf: &[u8], pos: &mut usize) -> io::Result<String> {
    let start = *pos;
    let nul = buf[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unterminated name in record body"))?;
    let name = String::from_utf8_lossy(&buf[start..start + nul]).into_owned();
    *pos = start + nul + 1;
    Ok(name)
}

fn write_cstring(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn read_u32(buf: &[u8], pos: &mut usize) -> u32 {
    let v = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    v
}

fn read_u64(buf: &[u8], pos: &mut usize) -> u64 {
    let v = u64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

fn read_f64(buf: &[u8], pos: &mut usize) -> f64 {
    let v = f64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

/// One `(id, name)` entry of a parameter-definitions record.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinitionEntry {
    pub id: u32,
    pub name: String,
}

/// Decoded body of a [`PARAMETER_DEFINITIONS`] record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterDefinitionsBody {
    pub entries: Vec<ParameterDefinitionEntry>,
}

impl ParameterDefinitionsBody {
    pub fn decode(body: &[u8]) -> io::Result<Self> {
        let mut pos = 0usize;
        let count = read_u32(body, &mut pos);
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = read_u32(body, &mut pos);
            let name = read_cstring(body, &mut pos)?;
            entries.push(ParameterDefinitionEntry { id, name });
        }
        Ok(Self { entries })
    }

    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for e in &self.entries {
            out.extend_from_slice(&e.id.to_le_bytes());
            write_cstring(&mut out, &e.name);
        }
        out
    }

    /// Encode the full record (header + body).
    pub fn encode_record(&self) -> Vec<u8> {
        encode_record(PARAMETER_DEFINITIONS, &self.encode_body())
    }
}

/// One named steering variable entry of a variable-values record.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub name: String,
    pub units: String,
    pub value: f64,
}

/// Decoded body of a [`VARIABLE_VALUES`] record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableValuesBody {
    pub entries: Vec<VariableEntry>,
}

impl VariableValuesBody {
    pub fn decode(body: &[u8]) -> io::Result<Self> {
        let mut pos = 0usize;
        let count = read_u32(body, &mut pos);
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let value = read_f64(body, &mut pos);
            let units_bytes = &body[pos..pos + MAX_UNITS_LENGTH];
            pos += MAX_UNITS_LENGTH;
            let units_end = units_bytes.iter().position(|&b| b == 0).unwrap_or(MAX_UNITS_LENGTH);
            let units = String::from_utf8_lossy(&units_bytes[..units_end]).into_owned();
            let name = read_cstring(body, &mut pos)?;
            entries.push(VariableEntry { name, units, value });
        }
        Ok(Self { entries })
    }

    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for e in &self.entries {
            out.extend_from_slice(&e.value.to_le_bytes());
            let mut units_field = [0u8; MAX_UNITS_LENGTH];
            let units_bytes = e.units.as_bytes();
            let n = units_bytes.len().min(MAX_UNITS_LENGTH);
            units_field[..n].copy_from_slice(&units_bytes[..n]);
            out.extend_from_slice(&units_field);
            write_cstring(&mut out, &e.name);
        }
        out
    }

    pub fn encode_record(&self) -> Vec<u8> {
        encode_record(VARIABLE_VALUES, &self.encode_body())
    }
}

/// One `(param_id, value)` assignment in a parameter-data record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterAssignment {
    pub id: u32,
    pub value: f64,
}

/// Decoded body of a [`PARAMETER_DATA`] record: one trigger's assignments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterDataBody {
    pub trigger: u64,
    pub assignments: Vec<ParameterAssignment>,
}

impl ParameterDataBody {
    pub fn decode(body: &[u8]) -> io::Result<Self> {
        let mut pos = 0usize;
        let trigger = read_u64(body, &mut pos);
        let count = read_u32(body, &mut pos);
        let mut assignments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = read_u32(body, &mut pos);
            let value = read_f64(body, &mut pos);
            assignments.push(ParameterAssignment { id, value });
        }
        Ok(Self { trigger, assignments })
    }

    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.trigger.to_le_bytes());
        out.extend_from_slice(&(self.assignments.len() as u32).to_le_bytes());
        for a in &self.assignments {
            out.extend_from_slice(&a.id.to_le_bytes());
            out.extend_from_slice(&a.value.to_le_bytes());
        }
        out
    }

    pub fn encode_record(&self) -> Vec<u8> {
        encode_record(PARAMETER_DATA, &self.encode_body())
    }
}

/// Glue a type code and body together into a complete self-inclusive record.
fn encode_record(type_code: u32, body: &[u8]) -> Vec<u8> {
    let total_size = (super::header::RECORD_HEADER_BYTES + body.len()) as u32;
    let header = RecordHeader::new(total_size, type_code);
    let mut out = Vec::with_capacity(total_size as usize);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(body);
    out
}
