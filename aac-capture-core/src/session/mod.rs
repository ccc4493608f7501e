pub mod capture_driver;
pub mod dispatcher;
pub mod encoder_driver;
pub mod pipeline;
