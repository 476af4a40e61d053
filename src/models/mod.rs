pub mod queue_job;
pub mod workflow;
pub mod workflow_run;
