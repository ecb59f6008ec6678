use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{LocatorError, Result};
use crate::signal::{to_calibrated_signal, to_linear_power};
use crate::types::{MoteId, MoteKind, RoomId, Timestamp};

/// A beacon detection with its derived signal values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationarySignal {
    pub sender_id: RoomId,
    pub raw_reading: u8,
    pub rssi_dbm: i32,
    pub power_mw: f64,
}

impl StationarySignal {
    pub fn new(sender_id: RoomId, raw_reading: u8) -> Self {
        let rssi_dbm = to_calibrated_signal(raw_reading);
        StationarySignal {
            sender_id,
            raw_reading,
            rssi_dbm,
            power_mw: to_linear_power(rssi_dbm as f64),
        }
    }
}

/// One detection made by a receiver at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Observation {
    Mobile {
        time: Timestamp,
        receiver_id: MoteId,
        sender_id: MoteId,
    },
    Stationary {
        time: Timestamp,
        receiver_id: MoteId,
        signal: StationarySignal,
    },
}

impl Observation {
    pub fn mobile(time: Timestamp, receiver_id: MoteId, sender_id: MoteId) -> Self {
        Observation::Mobile {
            time,
            receiver_id,
            sender_id,
        }
    }

    pub fn stationary(time: Timestamp, receiver_id: MoteId, sender_id: RoomId, raw_reading: u8) -> Self {
        Observation::Stationary {
            time,
            receiver_id,
            signal: StationarySignal::new(sender_id, raw_reading),
        }
    }

    /// Build an observation from an unclassified raw record.
    ///
    /// The sender id decides the kind; stationary readings must fit the
    /// radio's single-byte register.
    pub fn classify(
        time: Timestamp,
        receiver_id: MoteId,
        sender: i64,
        raw_reading: i64,
        mobile_id_cutoff: MoteId,
    ) -> Result<Observation> {
        match MoteKind::classify(sender, mobile_id_cutoff) {
            Some(MoteKind::Mobile) => Ok(Observation::mobile(time, receiver_id, sender as MoteId)),
            Some(MoteKind::Stationary) => {
                let sender_id = sender as RoomId;
                let reading = u8::try_from(raw_reading).map_err(|_| LocatorError::InvalidReading {
                    sender: sender_id,
                    reading: raw_reading,
                })?;
                Ok(Observation::stationary(time, receiver_id, sender_id, reading))
            }
            None => Err(LocatorError::UnknownSignalKind { sender }),
        }
    }

    pub fn time(&self) -> Timestamp {
        match self {
            Observation::Mobile { time, .. } | Observation::Stationary { time, .. } => *time,
        }
    }

    pub fn receiver_id(&self) -> MoteId {
        match self {
            Observation::Mobile { receiver_id, .. } | Observation::Stationary { receiver_id, .. } => {
                *receiver_id
            }
        }
    }

    pub fn kind(&self) -> MoteKind {
        match self {
            Observation::Mobile { .. } => MoteKind::Mobile,
            Observation::Stationary { .. } => MoteKind::Stationary,
        }
    }
}

/// Everything one receiver heard at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstantSnapshot {
    time: Timestamp,
    receiver_id: MoteId,
    contacts: Vec<MoteId>,
    beacons: BTreeMap<RoomId, StationarySignal>,
}

impl InstantSnapshot {
    pub fn new(time: Timestamp, receiver_id: MoteId) -> Self {
        InstantSnapshot {
            time,
            receiver_id,
            contacts: Vec::new(),
            beacons: BTreeMap::new(),
        }
    }

    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn receiver_id(&self) -> MoteId {
        self.receiver_id
    }

    /// Add an observation; it must carry this snapshot's receiver and time.
    ///
    /// Repeated mobile senders are stored once. A repeated beacon keeps the
    /// latest reading.
    pub fn add(&mut self, observation: Observation) -> Result<()> {
        if observation.receiver_id() != self.receiver_id || observation.time() != self.time {
            return Err(LocatorError::Integrity {
                expected_receiver: self.receiver_id,
                expected_time: self.time,
                found_receiver: observation.receiver_id(),
                found_time: observation.time(),
            });
        }

        match observation {
            Observation::Mobile { sender_id, .. } => {
                if !self.contacts.contains(&sender_id) {
                    self.contacts.push(sender_id);
                }
            }
            Observation::Stationary { signal, .. } => {
                self.beacons.insert(signal.sender_id, signal);
            }
        }
        Ok(())
    }

    /// Mobile motes detected at this instant, in first-seen order.
    pub fn neighbor_ids(&self) -> &[MoteId] {
        &self.contacts
    }

    pub fn beacons(&self) -> impl Iterator<Item = &StationarySignal> {
        self.beacons.values()
    }

    /// Linear power per detected beacon.
    pub fn room_powers(&self) -> BTreeMap<RoomId, f64> {
        self.beacons
            .iter()
            .map(|(room, signal)| (*room, signal.power_mw))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.beacons.is_empty()
    }
}
