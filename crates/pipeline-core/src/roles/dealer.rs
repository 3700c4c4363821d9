//! The Dealer (rank 0): reads the input file and answers Worker requests.
//!
//! Grounded on `MPIRawReader.cpp` (raw variant: block counting and
//! end-flagged replies once the source is exhausted) and
//! `MPIParameterDealer.cpp` (parameter variant: push definitions once,
//! then forward or transform each subsequent record).

use std::io::Read;

use crate::error::{PipelineError, Role};
use crate::message::{Message, ParameterDef, ParameterHeader, ParameterValue, VariableDef};
use crate::record::reader::DecodedRecord;
use crate::record::{ParameterDefinitionsBody, RecordReader, VariableValuesBody};
use crate::transport::DealerChannels;
use crate::workflow::Counters;

/// Which flavor of input the Dealer is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealerVariant {
    /// Input is opaque records; blocks are handed out whole.
    Raw { block_size: usize },
    /// Input begins with a parameter-definitions and a variables record;
    /// thereafter each record is either parameter data (transformed to
    /// wire form) or forwarded verbatim to the Outputter.
    Parameter,
}

/// Run the Dealer role to completion over `source`.
pub fn run<R: Read>(
    source: R,
    variant: DealerVariant,
    num_workers: usize,
    channels: DealerChannels,
    ctrs: &mut Counters,
) -> Result<(), PipelineError> {
    let role = Role::Dealer;
    let mut reader = RecordReader::new(source, role);

    match variant {
        DealerVariant::Raw { block_size } => run_raw(&mut reader, block_size, num_workers, channels, ctrs),
        DealerVariant::Parameter => run_parameter(&mut reader, num_workers, channels, ctrs),
    }
}

fn run_raw<R: Read>(
    reader: &mut RecordReader<R>,
    block_size: usize,
    num_workers: usize,
    channels: DealerChannels,
    ctrs: &mut Counters,
) -> Result<(), PipelineError> {
    let role = Role::Dealer;
    let mut base_trigger: u64 = 0;

    loop {
        let (block_bytes, triggers_in_block) = read_block(reader, block_size)?;
        if block_bytes.is_empty() {
            break;
        }

        let request = channels.requests.recv()?;
        let reply_box = channels
            .worker_replies
            .get(request.requestor_rank)
            .ok_or_else(|| PipelineError::transport(role, "request from unknown worker rank"))?;
        reply_box.send(Message::Raw {
            header: crate::message::MessageHeader { size: block_bytes.len(), block_number: base_trigger, end_flag: false },
            bytes: block_bytes,
        })?;
        ctrs.increment("blocks_sent");
        base_trigger += triggers_in_block;
    }

    send_raw_end_to_all(&channels, num_workers)
}

/// Pull whole records from `reader` until at least `block_size` bytes have
/// been collected (or the source ends), returning the concatenated bytes
/// and the count of physics records (type code 30) encountered.
fn read_block<R: Read>(reader: &mut RecordReader<R>, block_size: usize) -> Result<(Vec<u8>, u64), PipelineError> {
    const PHYSICS_TYPE_CODE: u32 = 30;
    let mut bytes = Vec::new();
    let mut triggers = 0u64;

    while bytes.len() < block_size {
        match reader.next_record()? {
            None => break,
            Some(DecodedRecord::Passthrough(raw)) => {
                bytes.extend_from_slice(&raw.header.encode());
                bytes.extend_from_slice(&raw.body);
                if raw.header.type_code == PHYSICS_TYPE_CODE {
                    triggers += 1;
                }
            }
            Some(_structured) => {
                // Structured records (definitions/variables/parameter-data) do not
                // occur in the raw variant's input; treat as opaque would be wrong,
                // so this path is unreachable in a well-formed raw-variant stream.
                return Err(PipelineError::structural(Role::Dealer, "unexpected structured record in raw-variant input"));
            }
        }
    }
    Ok((bytes, triggers))
}

fn run_parameter<R: Read>(
    reader: &mut RecordReader<R>,
    num_workers: usize,
    channels: DealerChannels,
    ctrs: &mut Counters,
) -> Result<(), PipelineError> {
    let role = Role::Dealer;

    let definitions = match reader.next_record()? {
        Some(DecodedRecord::ParameterDefinitions(body)) => body,
        _ => return Err(PipelineError::structural(role, "parameter-variant input must begin with a definitions record")),
    };
    let variables = match reader.next_record()? {
        Some(DecodedRecord::VariableValues(body)) => body,
        _ => return Err(PipelineError::structural(role, "parameter-variant input's second record must be a variables record")),
    };

    let defs_msg = Message::ParamDefs(
        definitions.entries.iter().map(|e| ParameterDef::new(e.id, e.name.clone())).collect(),
    );
    let vars_msg = Message::Variables(
        variables.entries.iter().map(|e| VariableDef::new(e.name.clone(), e.units.clone(), e.value)).collect(),
    );
    for reply_box in &channels.worker_replies {
        reply_box.send(defs_msg.clone())?;
        reply_box.send(vars_msg.clone())?;
    }

    loop {
        let record = match reader.next_record()? {
            Some(r) => r,
            None => break,
        };

        match record {
            DecodedRecord::ParameterData(body) => {
                let request = channels.requests.recv()?;
                let reply_box = channels
                    .worker_replies
                    .get(request.requestor_rank)
                    .ok_or_else(|| PipelineError::transport(role, "request from unknown worker rank"))?;
                let values: Vec<ParameterValue> =
                    body.assignments.iter().map(|a| ParameterValue { param_id: a.id, value: a.value }).collect();
                reply_box.send(Message::Parameters {
                    header: ParameterHeader { trigger_number: body.trigger, count: values.len() as u32, end_flag: false },
                    values,
                })?;
                ctrs.increment("parameter_records_sent");
            }
            DecodedRecord::Passthrough(raw) => {
                let mut record_bytes = Vec::with_capacity(raw.header.total_size as usize);
                record_bytes.extend_from_slice(&raw.header.encode());
                record_bytes.extend_from_slice(&raw.body);
                channels.outputter.send(Message::Passthrough {
                    header: ParameterHeader { trigger_number: 0, count: record_bytes.len() as u32, end_flag: false },
                    bytes: record_bytes,
                })?;
                ctrs.increment("passthroughs_forwarded");
            }
            DecodedRecord::ParameterDefinitions(_) | DecodedRecord::VariableValues(_) => {
                return Err(PipelineError::structural(role, "unexpected repeated definitions/variables record"));
            }
        }
    }

    send_parameter_end_to_all(&channels, num_workers)
}

fn send_raw_end_to_all(channels: &DealerChannels, num_workers: usize) -> Result<(), PipelineError> {
    for _ in 0..num_workers {
        let reply_box = next_requestor_reply_box(channels)?;
        reply_box.send(Message::Raw {
            header: crate::message::MessageHeader { size: 0, block_number: 0, end_flag: true },
            bytes: Vec::new(),
        })?;
    }
    Ok(())
}

fn send_parameter_end_to_all(channels: &DealerChannels, num_workers: usize) -> Result<(), PipelineError> {
    for _ in 0..num_workers {
        let reply_box = next_requestor_reply_box(channels)?;
        reply_box.send(Message::Parameters {
            header: ParameterHeader { trigger_number: 0, count: 0, end_flag: true },
            values: Vec::new(),
        })?;
    }
    Ok(())
}

fn next_requestor_reply_box(channels: &DealerChannels) -> Result<&crate::transport::Outbox<Message>, PipelineError> {
    let request = channels.requests.recv()?;
    channels
        .worker_replies
        .get(request.requestor_rank)
        .ok_or_else(|| PipelineError::transport(Role::Dealer, "end-phase request from unknown worker rank"))
}
