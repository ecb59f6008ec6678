use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{LocatorError, Result};
use crate::observation::{InstantSnapshot, Observation};
use crate::types::{MoteId, RoomId, Timestamp, UNKNOWN_ROOM};

/// Time-ordered snapshots heard by a single receiver.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObservationStore {
    receiver_id: MoteId,
    snapshots: BTreeMap<Timestamp, InstantSnapshot>,
}

impl ObservationStore {
    pub fn new(receiver_id: MoteId) -> Self {
        ObservationStore {
            receiver_id,
            snapshots: BTreeMap::new(),
        }
    }

    pub fn receiver_id(&self) -> MoteId {
        self.receiver_id
    }

    /// Add a single observation, creating the snapshot for its instant if needed.
    ///
    /// A rejected observation leaves the store unchanged.
    pub fn record(&mut self, observation: Observation) -> Result<()> {
        if observation.receiver_id() != self.receiver_id {
            return Err(LocatorError::Integrity {
                expected_receiver: self.receiver_id,
                expected_time: observation.time(),
                found_receiver: observation.receiver_id(),
                found_time: observation.time(),
            });
        }
        let time = observation.time();
        let receiver_id = self.receiver_id;
        self.snapshots
            .entry(time)
            .or_insert_with(|| InstantSnapshot::new(time, receiver_id))
            .add(observation)
    }

    /// Insert a complete snapshot, replacing any existing one for the same instant.
    pub fn insert_snapshot(&mut self, snapshot: InstantSnapshot) -> Result<()> {
        if snapshot.receiver_id() != self.receiver_id {
            return Err(LocatorError::Integrity {
                expected_receiver: self.receiver_id,
                expected_time: snapshot.time(),
                found_receiver: snapshot.receiver_id(),
                found_time: snapshot.time(),
            });
        }
        self.snapshots.insert(snapshot.time(), snapshot);
        Ok(())
    }

    pub fn get(&self, time: Timestamp) -> Option<&InstantSnapshot> {
        self.snapshots.get(&time)
    }

    pub fn contains(&self, time: Timestamp) -> bool {
        self.snapshots.contains_key(&time)
    }

    /// Mobile contacts at `time`; empty when nothing was recorded.
    pub fn neighbor_ids(&self, time: Timestamp) -> &[MoteId] {
        self.snapshots
            .get(&time)
            .map(|snapshot| snapshot.neighbor_ids())
            .unwrap_or(&[])
    }

    /// Beacon power per room at `time`; empty when nothing was recorded.
    pub fn nearest_room_powers(&self, time: Timestamp) -> BTreeMap<RoomId, f64> {
        self.snapshots
            .get(&time)
            .map(|snapshot| snapshot.room_powers())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.snapshots.keys().copied()
    }
}

/// Room assignment per timestamp for one receiver.
///
/// Entries are overwritten but never removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSequence {
    rooms: BTreeMap<Timestamp, RoomId>,
}

impl RoomSequence {
    pub fn new() -> Self {
        RoomSequence::default()
    }

    pub fn get(&self, time: Timestamp) -> Option<RoomId> {
        self.rooms.get(&time).copied()
    }

    pub fn set(&mut self, time: Timestamp, room: RoomId) {
        self.rooms.insert(time, room);
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, RoomId)> + '_ {
        self.rooms.iter().map(|(t, r)| (*t, *r))
    }

    /// Entries with a confident room, as handed to the timeline writer.
    pub fn known(&self) -> impl Iterator<Item = (Timestamp, RoomId)> + '_ {
        self.iter().filter(|(_, room)| *room != UNKNOWN_ROOM)
    }

    pub fn unknown_count(&self) -> usize {
        self.rooms.values().filter(|room| **room == UNKNOWN_ROOM).count()
    }
}

impl FromIterator<(Timestamp, RoomId)> for RoomSequence {
    fn from_iter<I: IntoIterator<Item = (Timestamp, RoomId)>>(iter: I) -> Self {
        RoomSequence {
            rooms: iter.into_iter().collect(),
        }
    }
}

/// Observation stores for every receiver in a run, keyed by receiver id.
///
/// Read-only once built; location estimates for one receiver look up the
/// stores of its contacts here.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    stores: BTreeMap<MoteId, ObservationStore>,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset::default()
    }

    /// Add a receiver's store, returning any store it replaced.
    pub fn insert(&mut self, store: ObservationStore) -> Option<ObservationStore> {
        self.stores.insert(store.receiver_id(), store)
    }

    pub fn get(&self, receiver: MoteId) -> Option<&ObservationStore> {
        self.stores.get(&receiver)
    }

    pub fn receivers(&self) -> impl Iterator<Item = MoteId> + '_ {
        self.stores.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Beacon powers heard by `mote` at `time`; motes without a store heard nothing.
    pub fn nearest_room_powers(&self, mote: MoteId, time: Timestamp) -> BTreeMap<RoomId, f64> {
        self.stores
            .get(&mote)
            .map(|store| store.nearest_room_powers(time))
            .unwrap_or_default()
    }
}

impl FromIterator<ObservationStore> for Dataset {
    fn from_iter<I: IntoIterator<Item = ObservationStore>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        for store in iter {
            dataset.insert(store);
        }
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_groups_by_time() {
        let mut store = ObservationStore::new(3);
        store.record(Observation::mobile(600, 3, 9)).unwrap();
        store.record(Observation::stationary(600, 3, 10_050, 10)).unwrap();
        store.record(Observation::mobile(601, 3, 5)).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.neighbor_ids(600), &[9]);
        assert_eq!(store.neighbor_ids(601), &[5]);
        assert_eq!(store.nearest_room_powers(600).len(), 1);
        assert!(store.nearest_room_powers(601).is_empty());
    }

    #[test]
    fn test_missing_time_is_empty() {
        let store = ObservationStore::new(3);
        assert!(store.get(600).is_none());
        assert!(store.neighbor_ids(600).is_empty());
        assert!(store.nearest_room_powers(600).is_empty());
    }

    #[test]
    fn test_foreign_record_rejected_without_side_effects() {
        let mut store = ObservationStore::new(3);
        store.record(Observation::mobile(600, 3, 9)).unwrap();

        let err = store.record(Observation::mobile(601, 4, 9)).unwrap_err();
        assert!(matches!(
            err,
            LocatorError::Integrity {
                expected_receiver: 3,
                found_receiver: 4,
                ..
            }
        ));
        assert_eq!(store.len(), 1);
        assert!(!store.contains(601));

        // later records still land
        store.record(Observation::mobile(602, 3, 9)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_snapshot_checks_receiver() {
        let mut store = ObservationStore::new(3);
        assert!(store.insert_snapshot(InstantSnapshot::new(600, 8)).is_err());
        assert!(store.insert_snapshot(InstantSnapshot::new(600, 3)).is_ok());
        assert!(store.contains(600));
    }

    #[test]
    fn test_room_sequence_known_skips_unknown() {
        let sequence: RoomSequence = vec![(1, 10_050), (2, UNKNOWN_ROOM), (3, 10_051)]
            .into_iter()
            .collect();
        assert_eq!(sequence.known().collect::<Vec<_>>(), vec![(1, 10_050), (3, 10_051)]);
        assert_eq!(sequence.unknown_count(), 1);
        assert_eq!(sequence.len(), 3);
    }

    #[test]
    fn test_dataset_lookup() {
        let mut store = ObservationStore::new(3);
        store.record(Observation::stationary(600, 3, 10_050, 10)).unwrap();
        let dataset: Dataset = vec![store, ObservationStore::new(4)].into_iter().collect();

        assert_eq!(dataset.receivers().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(dataset.nearest_room_powers(3, 600).len(), 1);
        assert!(dataset.nearest_room_powers(4, 600).is_empty());
        assert!(dataset.nearest_room_powers(99, 600).is_empty());
    }
}
