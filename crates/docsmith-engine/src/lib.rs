//! Documentation orchestration engine.
//!
//! This crate drives a repository from "selected" through
//! "ingested → generating → complete": the in-process progress bus, the
//! ingestor that materializes repository trees, the supervised analyzer
//! subprocess, the per-repo single-flight guard, the orchestrating state
//! machine and the status reconciler.

pub mod analyzer;
pub mod bus;
pub mod flight;
pub mod ingest;
pub mod orchestrator;
pub mod reconcile;

pub use analyzer::{collect_markdown_files, AnalyzerRequest, AnalyzerRunner};
pub use bus::{ProgressBus, Subscription, BUFFER_TTL};
pub use flight::{FlightOutcome, SingleFlight};
pub use ingest::Ingestor;
pub use orchestrator::{Orchestrator, PushOutcome, SelectOutcome};
pub use reconcile::StatusReconciler;
