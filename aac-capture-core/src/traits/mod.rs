pub mod block_encoder;
pub mod input_backend;
pub mod pipeline_delegate;
