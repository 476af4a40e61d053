pub mod mock_db;
pub mod postgres_queue_repository;
pub mod postgres_workflow_repository;
pub mod queue_repository;
pub mod workflow_repository;
