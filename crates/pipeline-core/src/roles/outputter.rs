//! The Outputter (rank 2): writes the Farmer's ordered events and any
//! passthroughs to the output file.
//!
//! Grounded on `MPIParameterOutput.cpp`'s receive-any-tag loop: HEADER
//! (events) and PASSTHROUGH race freely until the Farmer's single end
//! sentinel arrives.

use std::io::Write;

use crate::error::{PipelineError, Role};
use crate::message::Message;
use crate::record::codec::{ParameterAssignment, ParameterDataBody};
use crate::record::header::RecordHeader;
use crate::record::writer::RecordWriter;
use crate::record::{ParameterDefinitionsBody, VariableValuesBody};
use crate::transport::OutputterChannels;
use crate::workflow::Counters;

/// Run the Outputter role to completion, writing to `sink`.
///
/// `definitions`/`variables` reflect this process's own tree-parameter
/// registry at startup and become the output file's mandatory preamble.
pub fn run<W: Write>(
    sink: W,
    definitions: &ParameterDefinitionsBody,
    variables: &VariableValuesBody,
    channels: OutputterChannels,
    ctrs: &mut Counters,
) -> Result<(), PipelineError> {
    let role = Role::Outputter;
    let mut writer = RecordWriter::new(sink, role, definitions, variables)?;

    loop {
        let message = channels.inbox.recv()?;
        match message {
            Message::Parameters { header, values } => {
                let assignments =
                    values.into_iter().map(|v| ParameterAssignment { id: v.param_id, value: v.value }).collect();
                writer.write_event(&ParameterDataBody { trigger: header.trigger_number, assignments })?;
                ctrs.increment("events_written");
            }
            Message::Passthrough { bytes, .. } => {
                let record_header = RecordHeader::decode(&bytes).map_err(|e| PipelineError::structural(role, e.to_string()))?;
                let body = &bytes[crate::record::header::RECORD_HEADER_BYTES..];
                writer.write_passthrough(record_header, body)?;
                ctrs.increment("passthroughs_written");
            }
            Message::End => {
                writer.flush()?;
                return Ok(());
            }
            other => return Err(PipelineError::structural(role, format!("unexpected message on the Outputter inbox: {:?}", other.tag()))),
        }
    }
}
