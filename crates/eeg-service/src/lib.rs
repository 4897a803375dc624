//! EEG-Service: analysis request orchestration
//!
//! Dual-trigger ingestion (marker files + store polling), the persistent
//! request store, the recording-decode seam, and the per-request
//! orchestrator.

pub mod config;
pub mod ingest;
pub mod loader;
pub mod processor;
pub mod store;

pub use config::ServiceConfig;
pub use ingest::{MarkerWatcher, StorePoller};
pub use loader::{LoaderRegistry, RawRecordingLoader, SignalLoader};
pub use processor::{ProcessOutcome, RequestProcessor};
pub use store::{FileStore, RequestStore};
