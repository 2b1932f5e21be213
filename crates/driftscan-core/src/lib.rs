//! # driftscan-core
//!
//! Online density-based clustering of time-ordered detector hits.
//!
//! The engine consumes `(time, channel)` points in monotone time order and
//! continuously emits DBSCAN clusters with the same membership a batch run
//! over the full stream would produce, while retaining only a sliding
//! window of recent hits. It is built for trigger/readout pipelines where
//! throughput must track the real-time data rate.
//!
//! ## Components
//!
//! - [`hit`] — the unit datum: identity, geometry, per-hit DBSCAN state
//! - [`arena`] — hit storage with stable indices and slot reuse
//! - [`buffer`] — the time-sorted sliding window
//! - [`cluster`] — clusters under formation and their finalized output form
//! - [`engine`] — the incremental state machine orchestrating
//!   arrival, neighbour discovery, attach/spawn/merge, reachability
//!   expansion, finalization and trimming
//! - [`batch`] — the textbook reference DBSCAN used as a test oracle
//!
//! ## Quick start
//!
//! ```
//! use driftscan_core::{DbscanConfig, IncrementalDbscan};
//!
//! let mut engine = IncrementalDbscan::new(DbscanConfig::new(5.0, 2));
//! for (time, chan) in [(0.0, 40), (0.5, 41), (1.0, 42), (30.0, 7)] {
//!     engine.ingest_point(time, chan)?;
//!     engine.trim();
//! }
//! engine.flush();
//!
//! let clusters = engine.drain();
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].hits.len(), 3);
//! # Ok::<(), driftscan_core::DriftscanError>(())
//! ```

pub mod arena;
pub mod batch;
pub mod buffer;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod errors;
pub mod hit;

pub use cluster::{Cluster, CompletedCluster, CompletedHit};
pub use config::{DbscanConfig, DEFAULT_EPS, DEFAULT_MIN_PTS, TRIM_LOOKBACK_FACTOR};
pub use engine::{ClusterConsumer, EngineStats, IncrementalDbscan};
pub use errors::{DriftscanError, Result};
pub use hit::{Completeness, Connectedness, Hit, HitId, CLUSTER_NOISE, CLUSTER_UNDEFINED};
