//! Top-level orchestration error. Per-crate domain errors stay as typed
//! `thiserror` enums (`GridError`, `PathError`, `ConfigError`, ...); this
//! type exists only for the handful of failures that are genuinely the
//! integration layer's own (construction, command translation), matching
//! this codebase's existing `AppError` shape.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("startup configuration invalid: {0}")]
    InvalidConfig(#[from] config::ConfigError),

    #[error("command rejected: {0}")]
    CommandRejected(String),
}
