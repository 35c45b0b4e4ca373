//! Data models for the exposure index

pub mod exposure;
pub mod instrument;

pub use exposure::ExposureRecord;
pub use instrument::{FieldSpec, InstrumentFamily, ObservationKeys};
