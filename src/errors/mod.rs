pub mod processor_error;

pub use processor_error::{ProcessorError, ProcessorResult};
