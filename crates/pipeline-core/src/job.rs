//! Rank dispatch and thread spawning for one job run.
//!
//! Grounded on `AbstractApplication.h`'s `operator()`: examine the rank,
//! dispatch to the matching role procedure, and on any role's error
//! propagate it up and end the job. Reimplemented with `crossbeam::scope`
//! spawning one thread per rank instead of `MPI_Init`/a rank query; see
//! the transport-equivalence note in [`crate::transport`].

use std::io::{Read, Write};

use crate::error::{PipelineError, Role};
use crate::record::{ParameterDefinitionsBody, VariableValuesBody};
use crate::roles::{dealer, farmer, outputter, worker, DealerVariant};
use crate::transport::JobChannels;
use crate::tree::TreeRegistry;
use crate::workflow::Counters;

/// A Worker's per-record/per-event transform, supplied by the caller.
/// Shared across worker threads, so it must be `Sync`.
pub enum WorkerLogic<'a> {
    RawToParameter(&'a (dyn Fn(&[u8], &mut TreeRegistry) + Sync)),
    ParameterToParameter(&'a (dyn Fn(&mut TreeRegistry) + Sync)),
}

/// Everything needed to run one job end to end.
pub struct JobConfig<'a> {
    pub variant: DealerVariant,
    pub num_workers: usize,
    pub channel_capacity: usize,
    pub worker_logic: WorkerLogic<'a>,
    /// This process's own tree-parameter registry, already populated;
    /// its contents become the Outputter's mandatory preamble per §4.6.
    pub output_definitions: ParameterDefinitionsBody,
    pub output_variables: VariableValuesBody,
}

fn counters_for(tool: &str) -> Counters {
    Counters::new(
        tool,
        &[
            ("blocks_sent", "raw blocks dispatched to workers"),
            ("parameter_records_sent", "parameter-data records dispatched to workers"),
            ("passthroughs_forwarded", "passthrough records forwarded to the outputter"),
            ("events_emitted", "events emitted"),
            ("events_written", "events written to the output file"),
            ("passthroughs_written", "passthrough records written to the output file"),
            ("reorder_high_water_mark", "largest pending-reorder set observed"),
        ],
    )
}

/// Run the full four-role pipeline to completion. Blocks until every
/// rank has finished or one has raised a fatal error, in which case the
/// first such error is returned and the job's exit status should be
/// non-zero.
pub fn run<R, W>(source: R, sink: W, config: JobConfig<'_>) -> Result<(), PipelineError>
where
    R: Read + Send,
    W: Write + Send,
{
    if config.num_workers == 0 {
        return Err(PipelineError::config(Role::Dealer, "at least one worker rank is required"));
    }

    let channels = JobChannels::new(config.num_workers, config.channel_capacity);
    let JobChannels { dealer: dealer_channels, workers: worker_channels, farmer: farmer_channels, outputter: outputter_channels } =
        channels;

    crossbeam::scope(|scope| {
        let variant = config.variant;
        let num_workers = config.num_workers;
        let dealer_handle = scope.spawn(move |_| {
            let mut ctrs = counters_for("dealer");
            dealer::run(source, variant, num_workers, dealer_channels, &mut ctrs)
        });

        let farmer_handle = scope.spawn(move |_| {
            let mut ctrs = counters_for("farmer");
            farmer::run(num_workers, farmer_channels, &mut ctrs)
        });

        let output_definitions = &config.output_definitions;
        let output_variables = &config.output_variables;
        let outputter_handle = scope.spawn(move |_| {
            let mut ctrs = counters_for("outputter");
            outputter::run(sink, output_definitions, output_variables, outputter_channels, &mut ctrs)
        });

        let worker_logic = &config.worker_logic;
        let worker_handles: Vec<_> = worker_channels
            .into_iter()
            .map(|wc| {
                scope.spawn(move |_| {
                    let mut ctrs = counters_for("worker");
                    match worker_logic {
                        WorkerLogic::RawToParameter(transform) => worker::run_raw_to_parameter(wc, *transform, &mut ctrs),
                        WorkerLogic::ParameterToParameter(transform) => {
                            worker::run_parameter_to_parameter(wc, *transform, &mut ctrs)
                        }
                    }
                })
            })
            .collect();

        let mut first_error = None;
        let mut record = |result: Result<(), PipelineError>| {
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        };

        record(join(dealer_handle));
        record(join(farmer_handle));
        record(join(outputter_handle));
        for handle in worker_handles {
            record(join(handle));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
    .unwrap_or_else(|_| Err(PipelineError::state(Role::Dealer, "a role thread panicked")))
}

fn join(handle: crossbeam::thread::ScopedJoinHandle<'_, Result<(), PipelineError>>) -> Result<(), PipelineError> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(PipelineError::state(Role::Dealer, "a role thread panicked")),
    }
}
