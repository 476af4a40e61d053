mod processor;

pub use processor::{process_workflow, ExecutionOutcome};
