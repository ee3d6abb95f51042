//! Synthetic traffic generator for the multi-instance demo API.
//!
//! This crate provides tools to:
//! - Sweep every endpoint of every server instance once per iteration
//! - Drive weighted single-request users with randomized think time
//! - Run either under a pool of virtual users bounded by time or iterations
//! - Collect latency and status metrics and report them (console, JSON, CSV)

pub mod config;
pub mod error;
pub mod host;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod script;
pub mod targets;

pub use config::{TestConfig, UserConfig, WeightedTask};
pub use error::{LoadError, LoadResult};
pub use host::{HttpGet, Instrumented, Pause, RequestOutcome, ReqwestGet, TokioPause};
pub use metrics::{MetricsCollector, TestResults};
pub use report::ResultsReport;
pub use runner::LoadRunner;
pub use script::{Iteration, Sweep, Weighted};
pub use targets::{Target, TargetPlan, DEFAULT_ENDPOINTS, DEFAULT_SERVERS};
