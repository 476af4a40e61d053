use std::env;

use uuid::Uuid;

use crate::queue::QueueConfig;

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    /// Identity handed out by the stand-in token verifier. Goes away once a
    /// real identity provider is wired in.
    pub dev_user_id: Uuid,
    pub queue: QueueConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        let dev_user_id = env::var("DEV_USER_ID")
            .ok()
            .and_then(|v| Uuid::parse_str(&v).ok())
            .unwrap_or_else(Uuid::nil);

        let mut queue = QueueConfig::default();
        if let Some(max_attempts) = env::var("QUEUE_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
        {
            queue.max_attempts = max_attempts.max(1);
        }
        if let Some(backoff_ms) = env::var("QUEUE_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            queue.backoff_base = std::time::Duration::from_millis(backoff_ms);
        }
        if let Some(concurrency) = env::var("WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            queue.concurrency = concurrency.max(1);
        }
        if let Some(poll_ms) = env::var("WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            queue.poll_interval = std::time::Duration::from_millis(poll_ms);
        }

        Config {
            database_url,
            frontend_origin,
            dev_user_id,
            queue,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: String::new(),
            frontend_origin: "http://localhost:5173".to_string(),
            dev_user_id: Uuid::nil(),
            queue: QueueConfig::default(),
        }
    }
}
