use serde::{Deserialize, Serialize};

/// Identifier of a mote. Mobile motes are people, stationary motes are room beacons.
pub type MoteId = u32;

/// Identifier of the stationary beacon standing in for a room.
pub type RoomId = MoteId;

/// Index on the global sampling grid (one step = one 20 s sample).
pub type Timestamp = i64;

/// Room id reported when no beacon was heard strongly enough.
pub const UNKNOWN_ROOM: RoomId = 0;

/// Sender ids below this value are mobile motes, the rest are beacons.
pub const DEFAULT_MOBILE_ID_CUTOFF: MoteId = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoteKind {
    Mobile,
    Stationary,
}

impl MoteKind {
    /// Classify a sender by its numeric id.
    ///
    /// Returns `None` for ids that cannot name a mote at all: negative values
    /// and values above `MoteId::MAX`.
    pub fn classify(sender: i64, mobile_id_cutoff: MoteId) -> Option<MoteKind> {
        if sender < 0 || sender > MoteId::MAX as i64 {
            return None;
        }
        if sender < mobile_id_cutoff as i64 {
            Some(MoteKind::Mobile)
        } else {
            Some(MoteKind::Stationary)
        }
    }
}

/// Half-open range of timestamps processed by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        TimeRange { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn iter(&self) -> std::ops::Range<Timestamp> {
        self.start..self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::new(600, 3000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_cutoff() {
        assert_eq!(MoteKind::classify(0, 10_000), Some(MoteKind::Mobile));
        assert_eq!(MoteKind::classify(9_999, 10_000), Some(MoteKind::Mobile));
        assert_eq!(MoteKind::classify(10_000, 10_000), Some(MoteKind::Stationary));
        assert_eq!(MoteKind::classify(10_050, 10_000), Some(MoteKind::Stationary));
    }

    #[test]
    fn test_classify_rejects_negative() {
        assert_eq!(MoteKind::classify(-1, 10_000), None);
    }

    #[test]
    fn test_classify_rejects_ids_beyond_mote_range() {
        assert_eq!(MoteKind::classify(MoteId::MAX as i64 + 1, 10_000), None);
        assert_eq!(
            MoteKind::classify(MoteId::MAX as i64, 10_000),
            Some(MoteKind::Stationary)
        );
    }

    #[test]
    fn test_time_range() {
        let range = TimeRange::new(600, 603);
        assert!(!range.is_empty());
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![600, 601, 602]);
        assert!(TimeRange::new(5, 5).is_empty());
    }
}
