//! Per-station repeat suppression.
//!
//! A multi-volume series is written one file at a time, so a station emits
//! dozens of near-identical headers per series. Only the first is worth a
//! compliance check; the rest just bump a counter.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use mrqa_compliance::ComplianceRecord;

/// What a station is currently acquiring.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeriesSignature {
    pub series: String,
    pub sequence: String,
}

impl SeriesSignature {
    pub fn new(series: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            sequence: sequence.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StationState {
    pub signature: SeriesSignature,
    /// Headers seen for the current series after the first.
    pub repeat_count: u64,
    pub last_record: Option<ComplianceRecord>,
    #[serde(skip)]
    pub last_seen: Instant,
}

/// Result of feeding one header to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub is_new: bool,
    pub repeat_count: u64,
}

#[derive(Debug, Default)]
pub struct StationTracker {
    stations: HashMap<String, StationState>,
}

pub type SharedTracker = Arc<RwLock<StationTracker>>;

impl StationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTracker {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn on_event(&mut self, station: &str, signature: SeriesSignature) -> Observation {
        self.on_event_at(station, signature, Instant::now())
    }

    pub fn on_event_at(
        &mut self,
        station: &str,
        signature: SeriesSignature,
        now: Instant,
    ) -> Observation {
        match self.stations.get_mut(station) {
            Some(state) if state.signature == signature => {
                state.repeat_count += 1;
                state.last_seen = now;
                Observation {
                    is_new: false,
                    repeat_count: state.repeat_count,
                }
            }
            Some(state) => {
                debug!(station, from = ?state.signature, to = ?signature, "new series");
                state.signature = signature;
                state.repeat_count = 0;
                state.last_seen = now;
                Observation {
                    is_new: true,
                    repeat_count: 0,
                }
            }
            None => {
                info!(station, ?signature, "first series seen on station");
                self.stations.insert(
                    station.to_string(),
                    StationState {
                        signature,
                        repeat_count: 0,
                        last_record: None,
                        last_seen: now,
                    },
                );
                Observation {
                    is_new: true,
                    repeat_count: 0,
                }
            }
        }
    }

    /// Attach a check result to the station's current series.
    ///
    /// Dropped when the station has since moved on to another series; the
    /// result would describe the wrong acquisition.
    pub fn record_result(
        &mut self,
        station: &str,
        signature: &SeriesSignature,
        record: ComplianceRecord,
    ) -> bool {
        match self.stations.get_mut(station) {
            Some(state) if &state.signature == signature => {
                state.last_record = Some(record);
                true
            }
            _ => {
                debug!(station, ?signature, "stale check result dropped");
                false
            }
        }
    }

    pub fn get(&self, station: &str) -> Option<&StationState> {
        self.stations.get(station)
    }

    /// Last check result of every station that has one.
    pub fn snapshot(&self) -> BTreeMap<String, ComplianceRecord> {
        self.stations
            .iter()
            .filter_map(|(station, state)| {
                state
                    .last_record
                    .as_ref()
                    .map(|r| (station.clone(), r.clone()))
            })
            .collect()
    }

    /// Forget stations silent for longer than `max_idle`. Returns their names.
    pub fn expire_idle(&mut self, max_idle: Duration, now: Instant) -> Vec<String> {
        let mut expired: Vec<String> = self
            .stations
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_seen) > max_idle)
            .map(|(name, _)| name.clone())
            .collect();
        expired.sort();
        for name in &expired {
            self.stations.remove(name);
        }
        if !expired.is_empty() {
            info!(?expired, "expired idle stations");
        }
        expired
    }

    pub fn reset(&mut self, station: &str) -> bool {
        let removed = self.stations.remove(station).is_some();
        if removed {
            info!(station, "station state reset");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
