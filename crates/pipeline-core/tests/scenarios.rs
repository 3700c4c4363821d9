//! End-to-end scenarios assembling the full four-role job over in-process
//! channels. Hand-authored from the intent of the original `parintest.cpp`
//! / `sorttests.cpp` / `passthruTest.cpp` suite, adapted to this crate's
//! record/message formats.

use std::collections::HashMap;
use std::io::Cursor;

use pipeline_core::job::{self, JobConfig, WorkerLogic};
use pipeline_core::message::{Message, ParameterHeader, ParameterValue};
use pipeline_core::record::header::RECORD_HEADER_BYTES;
use pipeline_core::record::reader::DecodedRecord;
use pipeline_core::record::{
    ParameterAssignment, ParameterDataBody, ParameterDefinitionEntry, ParameterDefinitionsBody, RecordHeader,
    RecordReader, VariableValuesBody,
};
use pipeline_core::roles::{farmer, DealerVariant};
use pipeline_core::transport::JobChannels;
use pipeline_core::tree::{AxisHint, TreeRegistry};
use pipeline_core::workflow::Counters;
use pipeline_core::Role;

fn noop_raw_transform(_body: &[u8], _registry: &mut TreeRegistry) {}

fn run_raw_job(input: Vec<u8>, num_workers: usize, block_size: usize) -> Vec<u8> {
    let config = JobConfig {
        variant: DealerVariant::Raw { block_size },
        num_workers,
        channel_capacity: 64,
        worker_logic: WorkerLogic::RawToParameter(&noop_raw_transform),
        output_definitions: ParameterDefinitionsBody::default(),
        output_variables: VariableValuesBody::default(),
    };
    let mut output = Vec::new();
    job::run(Cursor::new(input), &mut output, config).expect("job should complete without error");
    output
}

fn skip_preamble(reader: &mut RecordReader<&[u8]>) {
    assert!(matches!(reader.next_record().unwrap(), Some(DecodedRecord::ParameterDefinitions(_))));
    assert!(matches!(reader.next_record().unwrap(), Some(DecodedRecord::VariableValues(_))));
}

/// S1: one begin record (type=1, size=12), one end record (type=2,
/// size=12). Output contains the preamble followed by those two records,
/// byte-identical.
#[test]
fn s1_empty_raw() {
    let mut input = Vec::new();
    input.extend_from_slice(&RecordHeader::new(RECORD_HEADER_BYTES as u32, 1).encode());
    input.extend_from_slice(&RecordHeader::new(RECORD_HEADER_BYTES as u32, 2).encode());

    let output = run_raw_job(input, 1, 4096);

    let mut reader = RecordReader::new(&output[..], Role::Outputter);
    skip_preamble(&mut reader);

    match reader.next_record().unwrap() {
        Some(DecodedRecord::Passthrough(raw)) => assert_eq!(raw.header.type_code, 1),
        other => panic!("unexpected {other:?}"),
    }
    match reader.next_record().unwrap() {
        Some(DecodedRecord::Passthrough(raw)) => assert_eq!(raw.header.type_code, 2),
        other => panic!("unexpected {other:?}"),
    }
    assert!(reader.next_record().unwrap().is_none());
}

/// S2: 100 passthrough records with 100-byte bodies, body\[i\] =
/// (record_index+i) mod 256. Output, after the preamble, contains them in
/// order with byte-identical bodies.
#[test]
fn s2_hundred_passthroughs() {
    const RECORD_TYPE: u32 = 5;
    const BODY_LEN: usize = 100;
    const RECORD_COUNT: usize = 100;

    let mut input = Vec::new();
    let mut expected_bodies = Vec::new();
    for i in 0..RECORD_COUNT {
        let body: Vec<u8> = (0..BODY_LEN).map(|j| ((i + j) % 256) as u8).collect();
        input.extend_from_slice(&RecordHeader::new((RECORD_HEADER_BYTES + BODY_LEN) as u32, RECORD_TYPE).encode());
        input.extend_from_slice(&body);
        expected_bodies.push(body);
    }

    let output = run_raw_job(input, 1, 1 << 20);

    let mut reader = RecordReader::new(&output[..], Role::Outputter);
    skip_preamble(&mut reader);

    for expected in expected_bodies {
        match reader.next_record().unwrap() {
            Some(DecodedRecord::Passthrough(raw)) => {
                assert_eq!(raw.header.type_code, RECORD_TYPE);
                assert_eq!(raw.body, expected);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(reader.next_record().unwrap().is_none());
}

/// S3: two workers each emit 1000 events, one producing the even triggers
/// 0..1998 and the other the odd triggers 1..1999, both out of order.
/// The Farmer must still emit all 2000 events strictly in trigger order
/// with matching parameters.
#[test]
fn s3_parallel_sort() {
    const EVENTS_PER_WORKER: u64 = 1000;
    let channel_capacity = (2 * EVENTS_PER_WORKER + 8) as usize;
    let channels = JobChannels::new(2, channel_capacity);

    let values_for = |trigger: u64| -> Vec<ParameterValue> {
        (0..10).map(|j| ParameterValue { param_id: (trigger + j) as u32, value: 2.0 * (trigger + j) as f64 }).collect()
    };
    let send_event = |rank: usize, trigger: u64| {
        channels.workers[rank]
            .farmer
            .send(Message::Parameters {
                header: ParameterHeader { trigger_number: trigger, count: 10, end_flag: false },
                values: values_for(trigger),
            })
            .unwrap();
    };

    // Worker 0 (even triggers) delivers in reverse order; worker 1 (odd
    // triggers) delivers in forward order, so arrival order never matches
    // trigger order for either producer.
    for i in (0..EVENTS_PER_WORKER).rev() {
        send_event(0, 2 * i);
    }
    for i in 0..EVENTS_PER_WORKER {
        send_event(1, 2 * i + 1);
    }
    channels.workers[0].farmer.send(Message::End).unwrap();
    channels.workers[1].farmer.send(Message::End).unwrap();

    let mut ctrs = Counters::new("test", &[("events_emitted", ""), ("reorder_high_water_mark", "")]);
    farmer::run(2, channels.farmer, &mut ctrs).unwrap();

    for trigger in 0..(2 * EVENTS_PER_WORKER) {
        match channels.outputter.inbox.recv().unwrap() {
            Message::Parameters { header, values } => {
                assert_eq!(header.trigger_number, trigger);
                assert_eq!(values, values_for(trigger));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(channels.outputter.inbox.recv().unwrap().is_end());
}

/// S4: the Dealer pushes 17 parameter definitions (`scalar` plus 16
/// `array.NN` entries) and 10,000 parameter-data records with varying
/// assignment counts. The Worker computes `doubled = scalar * 2` and
/// `sum = sum(array)`; the output carries 19 definitions (17 original plus
/// the two derived names) and all 10,000 events in trigger order.
#[test]
fn s4_parameter_to_parameter_mapping() {
    const SCALAR_ID: u32 = 1;
    const ARRAY_BASE_ID: u32 = 2;
    const ARRAY_LEN: u32 = 16;
    const EVENT_COUNT: u64 = 10_000;

    let mut input = Vec::new();
    let mut defs = ParameterDefinitionsBody { entries: vec![ParameterDefinitionEntry { id: SCALAR_ID, name: "scalar".into() }] };
    for i in 0..ARRAY_LEN {
        defs.entries.push(ParameterDefinitionEntry { id: ARRAY_BASE_ID + i, name: format!("array.{i:02}") });
    }
    input.extend_from_slice(&defs.encode_record());
    input.extend_from_slice(&VariableValuesBody::default().encode_record());

    let mut expected = Vec::with_capacity(EVENT_COUNT as usize);
    for trigger in 0..EVENT_COUNT {
        let scalar_value = trigger as f64 * 0.5;
        let array_count = if trigger % 2 == 0 { ARRAY_LEN } else { ARRAY_LEN / 2 };
        let mut assignments = vec![ParameterAssignment { id: SCALAR_ID, value: scalar_value }];
        let mut sum = 0.0;
        for i in 0..array_count {
            let v = (trigger + i as u64) as f64;
            assignments.push(ParameterAssignment { id: ARRAY_BASE_ID + i, value: v });
            sum += v;
        }
        input.extend_from_slice(&ParameterDataBody { trigger, assignments }.encode_record());
        expected.push((scalar_value * 2.0, sum));
    }

    // The framework has already loaded each pushed file_id's value into its
    // mapped local tree-parameter id before this runs, so the transform
    // reads the loaded registry state rather than raw (file_id, value)
    // pairs. The 17 pushed definitions claim local ids 0..16 in bind order
    // ("scalar" -> 0, "array.00".."array.15" -> 1..16), so the two names
    // the transform binds itself land on 17 ("doubled") and 18 ("sum").
    const SCALAR_LOCAL_ID: u32 = 0;
    const ARRAY_LOCAL_BASE: u32 = 1;
    const DOUBLED_LOCAL_ID: u32 = 17;
    const SUM_LOCAL_ID: u32 = 18;

    fn mapping_transform(registry: &mut TreeRegistry) {
        let mut scalar = 0.0;
        let mut sum = 0.0;
        for (id, value) in registry.collect() {
            if id == SCALAR_LOCAL_ID {
                scalar = value;
            } else if (ARRAY_LOCAL_BASE..ARRAY_LOCAL_BASE + ARRAY_LEN).contains(&id) {
                sum += value;
            }
        }
        let doubled_id = registry.bind("doubled", AxisHint::default());
        let sum_id = registry.bind("sum", AxisHint::default());
        registry.assign(doubled_id, scalar * 2.0);
        registry.assign(sum_id, sum);
    }

    let mut output_definitions = defs.clone();
    output_definitions.entries.push(ParameterDefinitionEntry { id: DOUBLED_LOCAL_ID, name: "doubled".into() });
    output_definitions.entries.push(ParameterDefinitionEntry { id: SUM_LOCAL_ID, name: "sum".into() });
    assert_eq!(output_definitions.entries.len(), 19);

    let config = JobConfig {
        variant: DealerVariant::Parameter,
        num_workers: 1,
        channel_capacity: 64,
        worker_logic: WorkerLogic::ParameterToParameter(&mapping_transform),
        output_definitions,
        output_variables: VariableValuesBody::default(),
    };
    let mut output = Vec::new();
    job::run(Cursor::new(input), &mut output, config).expect("job should complete without error");

    let mut reader = RecordReader::new(&output[..], Role::Outputter);
    match reader.next_record().unwrap() {
        Some(DecodedRecord::ParameterDefinitions(body)) => assert_eq!(body.entries.len(), 19),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(reader.next_record().unwrap(), Some(DecodedRecord::VariableValues(_))));

    for (trigger, (expected_doubled, expected_sum)) in expected.into_iter().enumerate() {
        match reader.next_record().unwrap() {
            Some(DecodedRecord::ParameterData(body)) => {
                assert_eq!(body.trigger, trigger as u64);
                let as_map: HashMap<u32, f64> = body.assignments.into_iter().map(|a| (a.id, a.value)).collect();
                assert_eq!(as_map.get(&DOUBLED_LOCAL_ID).copied(), Some(expected_doubled));
                assert_eq!(as_map.get(&SUM_LOCAL_ID).copied(), Some(expected_sum));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(reader.next_record().unwrap().is_none());
}

/// S5: a single worker receives 100 physics events but emits a parameter
/// event for only every other trigger. The Farmer must still flush its
/// gap-tolerant buffer once the worker signals end, releasing exactly the
/// 50 emitted triggers in order.
#[test]
fn s5_worker_drops_every_other_trigger() {
    let channels = JobChannels::new(1, 256);

    for trigger in (0..100u64).step_by(2) {
        channels.workers[0]
            .farmer
            .send(Message::Parameters {
                header: ParameterHeader { trigger_number: trigger, count: 1, end_flag: false },
                values: vec![ParameterValue { param_id: 1, value: trigger as f64 }],
            })
            .unwrap();
    }
    channels.workers[0].farmer.send(Message::End).unwrap();

    let mut ctrs = Counters::new("test", &[("events_emitted", ""), ("reorder_high_water_mark", "")]);
    farmer::run(1, channels.farmer, &mut ctrs).unwrap();

    for trigger in (0..100u64).step_by(2) {
        match channels.outputter.inbox.recv().unwrap() {
            Message::Parameters { header, values } => {
                assert_eq!(header.trigger_number, trigger);
                assert_eq!(values, vec![ParameterValue { param_id: 1, value: trigger as f64 }]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(channels.outputter.inbox.recv().unwrap().is_end());
}
