//! Buffered record writer with automatic front matter.
//!
//! Grounded on `DataWriter.h`: construction immediately emits the
//! parameter-definitions record and the variable-values record (the
//! "front matter" every output stream must begin with), and callers then
//! push one event/passthrough record at a time.

use std::io::{BufWriter, Write};

use crate::error::{PipelineError, Role};

use super::codec::{ParameterDataBody, ParameterDefinitionsBody, VariableValuesBody};
use super::header::RecordHeader;

/// Writes records to a byte sink, front matter first.
pub struct RecordWriter<W> {
    inner: BufWriter<W>,
    role: Role,
}

impl<W: Write> RecordWriter<W> {
    /// Open a writer and immediately emit the definitions and variables
    /// front matter. No event records may precede these on the stream.
    pub fn new(
        sink: W,
        role: Role,
        definitions: &ParameterDefinitionsBody,
        variables: &VariableValuesBody,
    ) -> Result<Self, PipelineError> {
        let mut writer = Self { inner: BufWriter::with_capacity(64 * 1024, sink), role };
        writer.write_raw(&definitions.encode_record())?;
        writer.write_raw(&variables.encode_record())?;
        Ok(writer)
    }

    /// Append one parameter-data (event) record.
    pub fn write_event(&mut self, event: &ParameterDataBody) -> Result<(), PipelineError> {
        self.write_raw(&event.encode_record())
    }

    /// Append an opaque passthrough record, unmodified.
    pub fn write_passthrough(&mut self, header: RecordHeader, body: &[u8]) -> Result<(), PipelineError> {
        if !header.is_passthrough() {
            return Err(PipelineError::structural(self.role, "write_passthrough called with a structured type code"));
        }
        let mut raw = Vec::with_capacity(header.total_size as usize);
        raw.extend_from_slice(&header.encode());
        raw.extend_from_slice(body);
        self.write_raw(&raw)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), PipelineError> {
        self.inner.write_all(bytes).map_err(|e| PipelineError::io(self.role, e.to_string()))
    }

    /// Flush buffered bytes to the underlying sink.
    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.inner.flush().map_err(|e| PipelineError::io(self.role, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::codec::ParameterAssignment;
    use crate::record::header::{RECORD_HEADER_BYTES, VARIABLE_VALUES};
    use crate::record::reader::{DecodedRecord, RecordReader};

    #[test]
    fn emits_front_matter_before_events() {
        let defs = ParameterDefinitionsBody { entries: vec![] };
        let vars = VariableValuesBody { entries: vec![] };
        let mut buf = Vec::new();
        {
            let mut writer = RecordWriter::new(&mut buf, Role::Outputter, &defs, &vars).unwrap();
            writer
                .write_event(&ParameterDataBody { trigger: 1, assignments: vec![ParameterAssignment { id: 0, value: 9.0 }] })
                .unwrap();
            writer.flush().unwrap();
        }

        let mut reader = RecordReader::new(&buf[..], Role::Outputter);
        assert!(matches!(reader.next_record().unwrap(), Some(DecodedRecord::ParameterDefinitions(_))));
        assert!(matches!(reader.next_record().unwrap(), Some(DecodedRecord::VariableValues(_))));
        match reader.next_record().unwrap() {
            Some(DecodedRecord::ParameterData(body)) => assert_eq!(body.trigger, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_structured_type_code_as_passthrough() {
        let defs = ParameterDefinitionsBody { entries: vec![] };
        let vars = VariableValuesBody { entries: vec![] };
        let mut buf = Vec::new();
        let mut writer = RecordWriter::new(&mut buf, Role::Outputter, &defs, &vars).unwrap();
        let bad_header = RecordHeader::new(RECORD_HEADER_BYTES as u32, VARIABLE_VALUES);
        assert!(writer.write_passthrough(bad_header, &[]).is_err());
    }
}
