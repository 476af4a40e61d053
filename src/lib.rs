pub mod config;
pub mod db;
pub mod engine;
pub mod integrations;
pub mod models;
pub mod queue;
pub mod responses;
pub mod routes;
pub mod state;

pub use state::AppState;
