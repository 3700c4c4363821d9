//! Buffered, bounded record reader.
//!
//! Grounded on `DataReader.h`'s `getBlock`/`done` acquire-release pair: the
//! reader hands out one record at a time and never holds more than one
//! record's bytes in memory at once, so a job's memory footprint does not
//! grow with file size.

use std::io::{BufReader, Read};

use crate::error::{PipelineError, Role};

use super::codec::{ParameterDataBody, ParameterDefinitionsBody, VariableValuesBody};
use super::header::{RecordHeader, PARAMETER_DATA, PARAMETER_DEFINITIONS, RECORD_HEADER_BYTES, VARIABLE_VALUES};

/// A single decoded record: its header plus the raw, still-encoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub header: RecordHeader,
    pub body: Vec<u8>,
}

/// A record whose structured types have been parsed out of the raw body.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    Passthrough(RawRecord),
    ParameterDefinitions(ParameterDefinitionsBody),
    VariableValues(VariableValuesBody),
    ParameterData(ParameterDataBody),
}

/// Reads records one at a time out of a byte stream, never buffering more
/// than a single record's body.
///
/// Exposes the `acquire`/`release` pair directly: `acquire(max_bytes)`
/// pulls the next record off the stream, rejecting it as a structural
/// error if it does not fit in `max_bytes`, and holds it until `release`
/// decodes and hands it back. Calling `acquire` again before `release`,
/// or calling `release` with nothing held, is a state error — the two
/// calls must alternate.
pub struct RecordReader<R> {
    inner: BufReader<R>,
    role: Role,
    done: bool,
    held: Option<RawRecord>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R, role: Role) -> Self {
        Self { inner: BufReader::with_capacity(64 * 1024, source), role, done: false, held: None }
    }

    /// Read and decode the next record, or `Ok(None)` at a clean end of
    /// stream. Equivalent to `acquire(usize::MAX)` followed by `release`.
    pub fn next_record(&mut self) -> Result<Option<DecodedRecord>, PipelineError> {
        if !self.acquire(usize::MAX)? {
            return Ok(None);
        }
        self.release().map(Some)
    }

    /// Pull the next record's header and body off the stream, bounded by
    /// `max_bytes`. Returns `Ok(false)` at a boundary that falls exactly on
    /// a record edge (a clean EOF). The acquired record is held until
    /// [`Self::release`] is called.
    ///
    /// Errors:
    /// - `StateError` if a record is already held (acquired but not yet released).
    /// - `StructuralError` if the record's self-reported `total_size` exceeds `max_bytes`.
    /// - `StructuralError` if `total_size` is shorter than the header itself.
    pub fn acquire(&mut self, max_bytes: usize) -> Result<bool, PipelineError> {
        if self.held.is_some() {
            return Err(PipelineError::state(self.role, "acquire called while a record is already held; call release first"));
        }
        if self.done {
            return Ok(false);
        }

        let mut header_bytes = [0u8; RECORD_HEADER_BYTES];
        if !read_exact_or_eof(&mut self.inner, &mut header_bytes, self.role)? {
            self.done = true;
            return Ok(false);
        }
        let header = RecordHeader::decode(&header_bytes).map_err(|e| PipelineError::structural(self.role, e.to_string()))?;
        if header.total_size as usize > max_bytes {
            return Err(PipelineError::structural(
                self.role,
                format!("record of {} bytes exceeds the {}-byte acquire bound", header.total_size, max_bytes),
            ));
        }
        let body_len = (header.total_size as usize)
            .checked_sub(RECORD_HEADER_BYTES)
            .ok_or_else(|| PipelineError::structural(self.role, "record total_size shorter than its own header"))?;
        let mut body = vec![0u8; body_len];
        self.inner
            .read_exact(&mut body)
            .map_err(|e| PipelineError::io(self.role, e.to_string()))?;
        self.held = Some(RawRecord { header, body });
        Ok(true)
    }

    /// Interpret the currently held record's body according to its type
    /// code, and release it so the next `acquire` may proceed.
    ///
    /// Errors with a `StateError` if no record is currently held.
    pub fn release(&mut self) -> Result<DecodedRecord, PipelineError> {
        let raw = self
            .held
            .take()
            .ok_or_else(|| PipelineError::state(self.role, "release called with no record held; call acquire first"))?;
        match raw.header.type_code {
            PARAMETER_DEFINITIONS => ParameterDefinitionsBody::decode(&raw.body)
                .map(DecodedRecord::ParameterDefinitions)
                .map_err(|e| PipelineError::structural(self.role, e.to_string())),
            VARIABLE_VALUES => VariableValuesBody::decode(&raw.body)
                .map(DecodedRecord::VariableValues)
                .map_err(|e| PipelineError::structural(self.role, e.to_string())),
            PARAMETER_DATA => ParameterDataBody::decode(&raw.body)
                .map(DecodedRecord::ParameterData)
                .map_err(|e| PipelineError::structural(self.role, e.to_string())),
            _ => Ok(DecodedRecord::Passthrough(raw)),
        }
    }
}

/// Like `Read::read_exact`, but reports a zero-byte read at the very start
/// of the buffer as a clean end of stream rather than an error.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8], role: Role) -> Result<bool, PipelineError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(PipelineError::io(role, "stream ended mid-header")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PipelineError::io(role, e.to_string())),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::codec::{ParameterAssignment, ParameterDataBody};

    #[test]
    fn reads_mixed_stream_in_order() {
        let defs = ParameterDefinitionsBody { entries: vec![] }.encode_record();
        let data = ParameterDataBody { trigger: 7, assignments: vec![ParameterAssignment { id: 1, value: 2.0 }] }
            .encode_record();
        let passthrough_body = b"opaque".to_vec();
        let passthrough = RecordHeader::new((RECORD_HEADER_BYTES + passthrough_body.len()) as u32, 5).encode();

        let mut stream = Vec::new();
        stream.extend_from_slice(&defs);
        stream.extend_from_slice(&passthrough);
        stream.extend_from_slice(&passthrough_body);
        stream.extend_from_slice(&data);

        let mut reader = RecordReader::new(&stream[..], Role::Worker(0));
        assert!(matches!(reader.next_record().unwrap(), Some(DecodedRecord::ParameterDefinitions(_))));
        assert!(matches!(reader.next_record().unwrap(), Some(DecodedRecord::Passthrough(_))));
        match reader.next_record().unwrap() {
            Some(DecodedRecord::ParameterData(body)) => assert_eq!(body.trigger, 7),
            other => panic!("unexpected {other:?}"),
        }
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn clean_eof_at_record_boundary_is_not_an_error() {
        let mut reader = RecordReader::new(&b""[..], Role::Worker(0));
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn truncated_header_is_an_error() {
        let mut reader = RecordReader::new(&[1u8, 2, 3][..], Role::Worker(0));
        assert!(reader.next_record().is_err());
    }

    #[test]
    fn acquire_release_sequence_is_correct_regardless_of_how_max_varies() {
        let defs = ParameterDefinitionsBody { entries: vec![] }.encode_record();
        let data = ParameterDataBody { trigger: 7, assignments: vec![ParameterAssignment { id: 1, value: 2.0 }] }
            .encode_record();

        let mut stream = Vec::new();
        stream.extend_from_slice(&defs);
        stream.extend_from_slice(&data);

        let mut reader = RecordReader::new(&stream[..], Role::Worker(0));

        assert!(reader.acquire(defs.len()).unwrap());
        assert!(matches!(reader.release().unwrap(), DecodedRecord::ParameterDefinitions(_)));

        assert!(reader.acquire(usize::MAX).unwrap());
        match reader.release().unwrap() {
            DecodedRecord::ParameterData(body) => assert_eq!(body.trigger, 7),
            other => panic!("unexpected {other:?}"),
        }

        assert!(!reader.acquire(usize::MAX).unwrap());
    }

    #[test]
    fn acquire_while_a_record_is_already_held_is_a_state_error() {
        let data = ParameterDataBody { trigger: 1, assignments: vec![] }.encode_record();
        let mut reader = RecordReader::new(&data[..], Role::Worker(0));
        assert!(reader.acquire(usize::MAX).unwrap());
        assert!(matches!(reader.acquire(usize::MAX), Err(PipelineError::State { .. })));
    }

    #[test]
    fn release_with_nothing_held_is_a_state_error() {
        let mut reader = RecordReader::new(&b""[..], Role::Worker(0));
        assert!(matches!(reader.release(), Err(PipelineError::State { .. })));
    }

    #[test]
    fn record_larger_than_max_bytes_is_a_structural_error() {
        let data = ParameterDataBody { trigger: 1, assignments: vec![ParameterAssignment { id: 1, value: 2.0 }] }
            .encode_record();
        let mut reader = RecordReader::new(&data[..], Role::Worker(0));
        assert!(matches!(reader.acquire(RECORD_HEADER_BYTES), Err(PipelineError::Structural { .. })));
    }
}
