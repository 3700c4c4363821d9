//! On-disk record format: a fixed 12-byte header, a self-inclusive size,
//! and a typed body. See [`header`] for the type codes, [`codec`] for the
//! structured bodies, and [`reader`]/[`writer`] for streaming them.

pub mod codec;
pub mod header;
pub mod reader;
pub mod writer;

pub use codec::{ParameterAssignment, ParameterDataBody, ParameterDefinitionEntry, ParameterDefinitionsBody, VariableEntry, VariableValuesBody};
pub use header::RecordHeader;
pub use reader::{DecodedRecord, RawRecord, RecordReader};
pub use writer::RecordWriter;
