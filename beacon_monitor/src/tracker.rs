/*!
Beacon tracking across advertisements.

Eddystone beacons interleave frame types: UID or EID frames carry the
identity, while URL and TLM frames carry none. The tracker ties them together
by the advertiser's device address and forgets beacons that go quiet for
longer than the expiration window.
*/

use std::collections::HashMap;
use std::time::{Duration, Instant};
use eddystone::{BeaconObservation, Frame, TelemetryFrame};
use serde::Serialize;
use tracing::{debug, info};

/// A beacon the tracker currently knows about
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedBeacon {
    pub address: String,
    pub observation: BeaconObservation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip)]
    last_seen: Instant,
}

impl TrackedBeacon {
    fn new(address: &str, observation: BeaconObservation, now: Instant) -> Self {
        Self {
            address: address.to_string(),
            distance: observation.estimated_distance(),
            observation,
            url: None,
            last_seen: now,
        }
    }

    fn supersede(&mut self, observation: BeaconObservation, now: Instant) {
        // A fresh UID/EID frame has no telemetry; keep what was attached before
        let carried = match self.observation.telemetry() {
            Some(payload) if observation.telemetry().is_none() => {
                Some(TelemetryFrame::new(payload))
            }
            _ => None,
        };
        let observation = match carried {
            Some(telemetry) => observation.with_telemetry(telemetry),
            None => observation,
        };

        self.distance = observation.estimated_distance();
        self.observation = observation;
        self.last_seen = now;
    }

    fn is_expired(&self, now: Instant, expiration: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= expiration
    }
}

/// Tracker output, one per state change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "beacon", rename_all = "snake_case")]
pub enum BeaconEvent {
    Added(TrackedBeacon),
    Updated(TrackedBeacon),
    Expired(TrackedBeacon),
}

/// Tracker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub beacons_added: u64,
    pub beacons_expired: u64,
    pub updates: u64,
    pub orphaned_frames: u64,
    pub empty_frames: u64,
}

/// Address-keyed beacon registry with expiration
pub struct BeaconTracker {
    beacons: HashMap<String, TrackedBeacon>,
    expiration: Duration,
    stats: TrackerStats,
}

impl BeaconTracker {
    /// Create a tracker that expires beacons after `expiration` of silence
    pub fn new(expiration: Duration) -> Self {
        Self {
            beacons: HashMap::new(),
            expiration,
            stats: TrackerStats::default(),
        }
    }

    /// Apply one decoded frame from `address`, returning the resulting event.
    ///
    /// URL and TLM frames from an address with no known beacon are dropped,
    /// since there is nothing to attach them to.
    pub fn process(&mut self, address: &str, frame: Frame, now: Instant) -> Option<BeaconEvent> {
        match frame {
            Frame::Uid(observation) | Frame::Eid(observation) => {
                if let Some(beacon) = self.beacons.get_mut(address) {
                    beacon.supersede(observation, now);
                    self.stats.updates += 1;
                    return Some(BeaconEvent::Updated(beacon.clone()));
                }

                let beacon = TrackedBeacon::new(address, observation, now);
                info!("📡 Beacon added: {} ({})", beacon.observation.identifier_hex(), address);
                self.beacons.insert(address.to_string(), beacon.clone());
                self.stats.beacons_added += 1;
                Some(BeaconEvent::Added(beacon))
            }

            Frame::Url(url) => self.update(address, now, |beacon| {
                beacon.url = Some(url.into_string());
            }),

            Frame::Telemetry(telemetry) => self.update(address, now, |beacon| {
                beacon.observation = beacon.observation.clone().with_telemetry(telemetry);
            }),

            Frame::Empty => {
                self.stats.empty_frames += 1;
                None
            }
        }
    }

    fn update<F>(&mut self, address: &str, now: Instant, apply: F) -> Option<BeaconEvent>
    where
        F: FnOnce(&mut TrackedBeacon),
    {
        match self.beacons.get_mut(address) {
            Some(beacon) => {
                apply(beacon);
                beacon.last_seen = now;
                self.stats.updates += 1;
                Some(BeaconEvent::Updated(beacon.clone()))
            }
            None => {
                debug!("Dropping frame from untracked address {}", address);
                self.stats.orphaned_frames += 1;
                None
            }
        }
    }

    /// Remove beacons not seen within the expiration window, ordered by address
    pub fn expire(&mut self, now: Instant) -> Vec<BeaconEvent> {
        let expiration = self.expiration;
        let mut expired: Vec<String> = self
            .beacons
            .iter()
            .filter(|(_, beacon)| beacon.is_expired(now, expiration))
            .map(|(address, _)| address.clone())
            .collect();
        expired.sort();

        expired
            .into_iter()
            .filter_map(|address| self.beacons.remove(&address))
            .map(|beacon| {
                info!(
                    "⌛ Beacon expired: {} ({})",
                    beacon.observation.identifier_hex(),
                    beacon.address
                );
                self.stats.beacons_expired += 1;
                BeaconEvent::Expired(beacon)
            })
            .collect()
    }

    pub fn get(&self, address: &str) -> Option<&TrackedBeacon> {
        self.beacons.get(address)
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }
}
