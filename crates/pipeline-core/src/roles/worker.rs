//! Workers (ranks 3..N-1): pull a block from the Dealer, run user code
//! over it, and push the resulting event to the Farmer.
//!
//! Grounded on `MPIParametersToParametersWorker.cpp` (definitions/variables
//! handshake, parameter-to-parameter mapping) and `MPIRawToParametersWorker.cpp`
//! (physics-record counting within a raw block).

use std::collections::HashMap;

use crate::error::{PipelineError, Role};
use crate::message::{Message, ParameterDef, ParameterHeader, ParameterValue, Request};
use crate::record::header::RECORD_HEADER_BYTES;
use crate::record::RecordHeader;
use crate::transport::WorkerChannels;
use crate::tree::{AxisHint, TreeRegistry};
use crate::workflow::Counters;

const PHYSICS_TYPE_CODE: u32 = 30;

/// A user transform over one physics record's tree-parameter state.
/// `registry` already has the event bound by the caller's loop; the
/// closure assigns whatever parameters it derives from `record_body`.
pub type RawTransform<'a> = dyn Fn(&[u8], &mut TreeRegistry) + 'a;

/// A user transform over one event's already-loaded tree parameters: the
/// caller's loop has loaded the incoming `(file_id, value)` pairs into
/// `registry` through the local map before the closure runs.
pub type ParameterTransform<'a> = dyn Fn(&mut TreeRegistry) + 'a;

/// Run a raw-to-parameter Worker: requests byte blocks, splits them back
/// into records, forwards non-physics records as passthroughs, and runs
/// `transform` over each physics record to produce an event.
pub fn run_raw_to_parameter(
    channels: WorkerChannels,
    transform: &RawTransform,
    ctrs: &mut Counters,
) -> Result<(), PipelineError> {
    let role = Role::Worker(channels.rank);
    let mut registry = TreeRegistry::new();

    loop {
        channels.requests.send(Request { requestor_rank: channels.rank, max_bytes: usize::MAX })?;
        let reply = channels.dealer_replies.recv()?;
        let (block_number, bytes) = match reply {
            Message::Raw { header, .. } if header.end_flag => {
                channels.farmer.send(Message::End)?;
                return Ok(());
            }
            Message::Raw { header, bytes } => (header.block_number, bytes),
            other => return Err(PipelineError::structural(role, format!("expected a raw reply, got {:?}", other.tag()))),
        };

        let mut trigger = block_number;
        let mut cursor = 0usize;
        while cursor < bytes.len() {
            let header = RecordHeader::decode(&bytes[cursor..]).map_err(|e| PipelineError::structural(role, e.to_string()))?;
            let total = header.total_size as usize;
            let record_body = &bytes[cursor + RECORD_HEADER_BYTES..cursor + total];

            if header.type_code == PHYSICS_TYPE_CODE {
                registry.next_event();
                transform(record_body, &mut registry);
                let values: Vec<ParameterValue> =
                    registry.collect().into_iter().map(|(id, value)| ParameterValue { param_id: id, value }).collect();
                channels.farmer.send(Message::Parameters {
                    header: ParameterHeader { trigger_number: trigger, count: values.len() as u32, end_flag: false },
                    values,
                })?;
                ctrs.increment("events_emitted");
                trigger += 1;
            } else {
                let record_bytes = bytes[cursor..cursor + total].to_vec();
                channels.outputter.send(Message::Passthrough {
                    header: ParameterHeader { trigger_number: 0, count: record_bytes.len() as u32, end_flag: false },
                    bytes: record_bytes,
                })?;
                ctrs.increment("passthroughs_forwarded");
            }
            cursor += total;
        }
    }
}

/// Run a parameter-to-parameter Worker: receives the Dealer's pushed
/// definitions/variables once, then for each event maps incoming
/// `(file_id, value)` pairs through a local tree-parameter table.
pub fn run_parameter_to_parameter(
    channels: WorkerChannels,
    transform: &ParameterTransform,
    ctrs: &mut Counters,
) -> Result<(), PipelineError> {
    let role = Role::Worker(channels.rank);
    let mut registry = TreeRegistry::new();

    let defs = match channels.dealer_replies.recv()? {
        Message::ParamDefs(defs) => defs,
        other => return Err(PipelineError::structural(role, format!("expected ParamDefs, got {:?}", other.tag()))),
    };
    let _vars = match channels.dealer_replies.recv()? {
        Message::Variables(vars) => vars,
        other => return Err(PipelineError::structural(role, format!("expected Variables, got {:?}", other.tag()))),
    };

    let file_id_to_local = build_local_map(&defs, &mut registry);

    loop {
        channels.requests.send(Request { requestor_rank: channels.rank, max_bytes: usize::MAX })?;
        let reply = channels.dealer_replies.recv()?;
        let (header, values) = match reply {
            Message::Parameters { header, .. } if header.end_flag => {
                channels.farmer.send(Message::End)?;
                return Ok(());
            }
            Message::Parameters { header, values } => (header, values),
            other => return Err(PipelineError::structural(role, format!("expected a Parameters reply, got {:?}", other.tag()))),
        };

        registry.next_event();
        let mapped: Vec<(u32, f64)> = values.into_iter().map(|v| (v.param_id, v.value)).collect();
        for &(file_id, value) in &mapped {
            if let Some(&local_id) = file_id_to_local.get(&file_id) {
                registry.assign(local_id, value);
            }
        }
        transform(&mut registry);

        let out: Vec<ParameterValue> =
            registry.collect().into_iter().map(|(id, value)| ParameterValue { param_id: id, value }).collect();
        channels.farmer.send(Message::Parameters {
            header: ParameterHeader { trigger_number: header.trigger_number, count: out.len() as u32, end_flag: false },
            values: out,
        })?;
        ctrs.increment("events_emitted");
    }
}

/// Build a `file_id -> local registry id` map: resize a sparse table to
/// `max(file_id)+1` and bind (or look up) a local handle by name for each
/// pushed definition.
fn build_local_map(defs: &[ParameterDef], registry: &mut TreeRegistry) -> HashMap<u32, u32> {
    let mut map = HashMap::with_capacity(defs.len());
    for def in defs {
        let local_id = registry.bind(&def.name, AxisHint::default());
        map.insert(def.id, local_id);
    }
    map
}
