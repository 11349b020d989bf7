//! Composition worker.
//!
//! This crate provides:
//! - Compose-and-upload on top of the media composer
//! - Optional narration synthesis ahead of the render
//! - Per-project admission control
//! - Environment configuration, structured request logging and metrics

pub mod admission;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod request;

pub use admission::{AdmissionControl, AdmissionPermit};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{progress_observer, CompositionLogger};
pub use pipeline::{compose_and_upload, CompositionService};
pub use request::{load_request, parse_request};
