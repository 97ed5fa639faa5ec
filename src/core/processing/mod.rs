//! Per-pixel SEBAL stages and the pipeline that chains them.
pub mod align;
pub mod calibration;
pub mod flux;
pub mod indices;
pub mod pipeline;
pub mod radiation;
