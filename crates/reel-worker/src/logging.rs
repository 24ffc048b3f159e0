//! Structured job logging.
//!
//! Every event carries the job id and operation; stage events also carry the
//! planning stage and all events the milliseconds since the job started.

use std::time::Instant;

use reel_models::JobId;
use tracing::{error, info, warn, Span};

/// Lifecycle logger for one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            started: Instant::now(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Progress within a named stage (`load`, `vision`, `plan`, `render`).
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = stage,
            elapsed_ms = self.elapsed_ms(),
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_ms = self.elapsed_ms(),
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_ms = self.elapsed_ms(),
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_ms = self.elapsed_ms(),
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Span carrying the job id and operation for everything beneath it.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = %self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let logger = JobLogger::new(&JobId::from_string("reel-7"), "plan_reel");

        assert_eq!(logger.job_id(), "reel-7");
        assert_eq!(logger.operation(), "plan_reel");
        assert!(logger.elapsed_ms() < 60_000);
    }

    #[test]
    fn test_logging_without_subscriber_is_silent() {
        let logger = JobLogger::new(&JobId::new(), "plan_reel");
        let _guard = logger.create_span().entered();
        logger.log_stage("plan", "9 shots");
        logger.log_warning("2 images undecodable");
    }
}
