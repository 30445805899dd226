//! Live per-station compliance feed.
//!
//! File-system events become header reads; the [`StationTracker`] suppresses
//! repeats within a series; new series are checked and every outcome is
//! fanned out through the [`Broadcaster`].

pub mod broadcast;
pub mod error;
pub mod event;
pub mod monitor;
pub mod tracker;
pub mod watcher;

pub use broadcast::Broadcaster;
pub use error::{LiveError, Result};
pub use event::LiveEvent;
pub use monitor::{LiveMonitor, MonitorSettings};
pub use tracker::{Observation, SeriesSignature, SharedTracker, StationState, StationTracker};
pub use watcher::DicomWatcher;
