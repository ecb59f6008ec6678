use log::trace;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::kernel::Kernel;
use crate::signal::power_to_dbm;
use crate::store::{Dataset, RoomSequence};
use crate::types::{MoteId, RoomId, TimeRange, Timestamp, UNKNOWN_ROOM};

/// Power (mW) below which a beacon is not believed to share the receiver's room (~ -85 dBm).
pub const DEFAULT_THRESHOLD_MW: f64 = 3.16e-9;

/// Outcome of one location decision, with the aggregated evidence behind it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Estimate {
    pub room: RoomId,
    pub signal_per_room: BTreeMap<RoomId, f64>,
    pub total_weighted_observations: f64,
    pub strongest_signal_mw: f64,
}

/// Picks the closest beacon for a receiver by pooling its own and its
/// contacts' beacon powers over a weighted window of neighbouring instants.
pub struct LocationEstimator<'a> {
    dataset: &'a Dataset,
    kernel: &'a Kernel,
    threshold_mw: f64,
}

impl<'a> LocationEstimator<'a> {
    pub fn new(dataset: &'a Dataset, kernel: &'a Kernel, threshold_mw: f64) -> Self {
        LocationEstimator {
            dataset,
            kernel,
            threshold_mw,
        }
    }

    pub fn threshold_mw(&self) -> f64 {
        self.threshold_mw
    }

    /// The receiver plus its mobile contacts at `time`.
    ///
    /// Empty (the receiver included) when the receiver recorded nothing then.
    fn contact_set(&self, receiver: MoteId, time: Timestamp) -> Vec<MoteId> {
        match self.dataset.get(receiver).and_then(|store| store.get(time)) {
            Some(snapshot) => {
                let mut contacts = Vec::with_capacity(snapshot.neighbor_ids().len() + 1);
                contacts.push(receiver);
                contacts.extend_from_slice(snapshot.neighbor_ids());
                contacts
            }
            None => Vec::new(),
        }
    }

    /// Aggregate evidence for `receiver` at `time` without recording anything.
    pub fn estimate(&self, receiver: MoteId, time: Timestamp) -> Estimate {
        // (instant, weight, contacts) for every window position with data
        let window: Vec<(Timestamp, f64, Vec<MoteId>)> = self
            .kernel
            .entries()
            .iter()
            .filter_map(|entry| {
                // a window position past the timestamp domain has no data
                let instant = time.checked_add(entry.offset)?;
                let contacts = self.contact_set(receiver, instant);
                if contacts.is_empty() {
                    None
                } else {
                    Some((instant, entry.weight, contacts))
                }
            })
            .collect();

        let total_weighted_observations: f64 = window
            .iter()
            .map(|(_, weight, contacts)| weight * contacts.len() as f64)
            .sum();

        let mut signal_per_room: BTreeMap<RoomId, f64> = BTreeMap::new();
        if total_weighted_observations > 0.0 {
            for (instant, weight, contacts) in &window {
                let mut instant_signal: BTreeMap<RoomId, f64> = BTreeMap::new();
                for contact in contacts {
                    for (room, power) in self.dataset.nearest_room_powers(*contact, *instant) {
                        *instant_signal.entry(room).or_insert(0.0) +=
                            power * weight / total_weighted_observations;
                    }
                }
                for (room, signal) in instant_signal {
                    *signal_per_room.entry(room).or_insert(0.0) += signal;
                }
            }
        }

        // Ascending room id with strict '>' so the lowest id wins a tie
        let mut room = UNKNOWN_ROOM;
        let mut strongest_signal_mw = 0.0;
        for (candidate, signal) in &signal_per_room {
            if *signal > strongest_signal_mw {
                room = *candidate;
                strongest_signal_mw = *signal;
            }
        }
        if strongest_signal_mw < self.threshold_mw {
            room = UNKNOWN_ROOM;
        }

        Estimate {
            room,
            signal_per_room,
            total_weighted_observations,
            strongest_signal_mw,
        }
    }

    /// Decide the room for `receiver` at `time` and record it in `sequence`.
    pub fn identify(&self, receiver: MoteId, time: Timestamp, sequence: &mut RoomSequence) -> RoomId {
        let estimate = self.estimate(receiver, time);
        trace!(
            "mote {} t={} -> room {} ({:.1} dBm over {} rooms)",
            receiver,
            time,
            estimate.room,
            power_to_dbm(estimate.strongest_signal_mw),
            estimate.signal_per_room.len()
        );
        sequence.set(time, estimate.room);
        estimate.room
    }

    /// Locate `receiver` at every timestamp of `range`, returning the number of
    /// confident (non-unknown) assignments.
    pub fn identify_range(&self, receiver: MoteId, range: TimeRange, sequence: &mut RoomSequence) -> usize {
        range
            .iter()
            .filter(|&time| self.identify(receiver, time, sequence) != UNKNOWN_ROOM)
            .count()
    }
}
