pub mod adts;
pub mod frame_accumulator;
pub mod timestamp;
