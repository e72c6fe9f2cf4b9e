//! # intake-jobs
//!
//! Everything that happens to a document after it is stored.
//!
//! This crate provides:
//! - Text extraction from PDF and DOCX bytes
//! - The lifecycle controller that claims, analyses and commits a document
//! - A bounded, at-most-once analysis worker with limited concurrency
//! - A periodic sweep that fails runs left `analysing` by a crash
//! - Email composition and delivery (Resend, or log-only when unconfigured)
//!
//! ## Example
//!
//! ```rust,ignore
//! use intake_jobs::{AnalysisWorker, LifecycleController, WorkerConfig};
//!
//! let controller = LifecycleController::new(stores, analysis, notifier, emails);
//! let (queue, handle) = AnalysisWorker::new(controller, WorkerConfig::from_env()).start();
//! queue.submit(document.id);
//! handle.shutdown().await?;
//! ```

pub mod adapters;
pub mod extraction;
pub mod lifecycle;
pub mod notification;
pub mod sweep;
pub mod worker;

pub use extraction::{ExtractionError, TextAdapter, TextExtractor};
pub use lifecycle::{failure_message, LifecycleController};
pub use notification::{sink_from_env, EmailComposer, LogOnlySink, ResendConfig, ResendMailer};
pub use sweep::{spawn_stale_sweep, sweep_stale};
pub use worker::{AnalysisQueue, AnalysisWorker, WorkerConfig, WorkerEvent, WorkerHandle};
