//! The Farmer (rank 1): wraps [`ReorderBuffer`] around the transport loop.
//!
//! Grounded on `MPIParameterFarmer.cpp`'s `operator()` loop around
//! `CTriggerSorter`: receive from any worker, feed the sorter, emit
//! whatever the sorter releases, and on a worker's end sentinel check
//! whether every worker has reported in.

use crate::error::{PipelineError, Role};
use crate::message::Message;
use crate::reorder::{emit_message, ReorderBuffer};
use crate::transport::FarmerChannels;
use crate::workflow::Counters;

/// Run the Farmer role to completion.
pub fn run(num_workers: usize, channels: FarmerChannels, ctrs: &mut Counters) -> Result<(), PipelineError> {
    let role = Role::Farmer;
    let mut buffer = ReorderBuffer::new(num_workers);

    loop {
        let message = channels.inbox.recv()?;
        match message {
            Message::Parameters { header, .. } if header.end_flag => {
                return Err(PipelineError::structural(role, "end_flag set on a Parameters message; workers signal end with Message::End"));
            }
            Message::Parameters { header, values } => {
                let ready = buffer.accept(header.trigger_number, values);
                for event in &ready {
                    channels.outputter.send(emit_message(event))?;
                }
                ctrs.add_to("events_emitted", ready.len());
            }
            Message::End => {
                if let Some(flushed) = buffer.worker_ended() {
                    for event in &flushed {
                        channels.outputter.send(emit_message(event))?;
                    }
                    ctrs.add_to("events_emitted", flushed.len());
                    ctrs.add_to("reorder_high_water_mark", buffer.high_water_mark());
                    channels.outputter.send(Message::End)?;
                    return Ok(());
                }
            }
            other => return Err(PipelineError::structural(role, format!("unexpected message on the Farmer inbox: {:?}", other.tag()))),
        }
    }
}
