use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LocatorError, Result};
use crate::store::RoomSequence;
use crate::types::{MoteId, RoomId, TimeRange, Timestamp};

/// Flicker signature over consecutive samples.
///
/// `true` positions must all hold one room (A), `false` positions another
/// room (B != A). On a match every B position is rewritten to A. Written as
/// letters, `"ABAA"` is `[true, false, true, true]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PatternRepr", into = "String")]
pub struct CorrectionPattern {
    labels: Vec<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PatternRepr {
    Labels(Vec<bool>),
    Letters(String),
}

impl CorrectionPattern {
    /// Both labels must appear; otherwise a match could never change anything.
    pub fn new(labels: Vec<bool>) -> Result<Self> {
        if !labels.contains(&true) || !labels.contains(&false) {
            return Err(LocatorError::InvalidConfig(format!(
                "pattern {:?} needs at least one A and one B position",
                labels
            )));
        }
        Ok(CorrectionPattern { labels })
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The A room if the window starting at `start` fits this pattern.
    fn match_at(&self, sequence: &RoomSequence, start: Timestamp) -> Option<RoomId> {
        let mut room_a: Option<RoomId> = None;
        let mut room_b: Option<RoomId> = None;

        for (offset, &is_a) in self.labels.iter().enumerate() {
            // gaps are not errors, the pattern just doesn't apply here
            let room = sequence.get(window_position(start, offset)?)?;
            if is_a {
                match room_a {
                    None if room_b == Some(room) => return None,
                    None => room_a = Some(room),
                    Some(a) if a != room => return None,
                    Some(_) => {}
                }
            } else {
                match room_b {
                    None => room_b = Some(room),
                    Some(b) if b != room => return None,
                    Some(_) => {}
                }
                if room_a == room_b {
                    return None;
                }
            }
        }
        room_a
    }

    fn apply(&self, sequence: &mut RoomSequence, start: Timestamp, room_a: RoomId) {
        for (offset, &is_a) in self.labels.iter().enumerate() {
            if is_a {
                continue;
            }
            if let Some(time) = window_position(start, offset) {
                sequence.set(time, room_a);
            }
        }
    }
}

/// Timestamp `offset` samples after `start`, if it exists.
fn window_position(start: Timestamp, offset: usize) -> Option<Timestamp> {
    Timestamp::try_from(offset)
        .ok()
        .and_then(|offset| start.checked_add(offset))
}

impl FromStr for CorrectionPattern {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self> {
        let labels = s
            .trim()
            .chars()
            .map(|c| match c.to_ascii_uppercase() {
                'A' => Ok(true),
                'B' => Ok(false),
                other => Err(LocatorError::InvalidConfig(format!(
                    "pattern '{}' contains '{}', expected only A and B",
                    s, other
                ))),
            })
            .collect::<Result<Vec<bool>>>()?;
        CorrectionPattern::new(labels)
    }
}

impl TryFrom<PatternRepr> for CorrectionPattern {
    type Error = LocatorError;

    fn try_from(repr: PatternRepr) -> Result<Self> {
        match repr {
            PatternRepr::Labels(labels) => CorrectionPattern::new(labels),
            PatternRepr::Letters(letters) => letters.parse(),
        }
    }
}

impl fmt::Display for CorrectionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &is_a in &self.labels {
            f.write_str(if is_a { "A" } else { "B" })?;
        }
        Ok(())
    }
}

impl From<CorrectionPattern> for String {
    fn from(pattern: CorrectionPattern) -> Self {
        pattern.to_string()
    }
}

/// Default flicker patterns for a 20 s grid: a one-sample excursion
/// (< 40 s) in either of the two middle positions.
pub fn default_patterns() -> Vec<CorrectionPattern> {
    vec![
        CorrectionPattern {
            labels: vec![true, false, true, true],
        },
        CorrectionPattern {
            labels: vec![true, true, false, true],
        },
    ]
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SmoothingReport {
    pub passes: usize,
    pub corrections: usize,
}

/// Removes short A -> B -> A flickers from a room sequence.
pub struct PatternSmoother<'a> {
    patterns: &'a [CorrectionPattern],
}

impl<'a> PatternSmoother<'a> {
    pub fn new(patterns: &'a [CorrectionPattern]) -> Self {
        PatternSmoother { patterns }
    }

    /// Try the patterns in order at `start`; the first match is applied.
    ///
    /// Returns whether a correction was made.
    pub fn smooth(&self, sequence: &mut RoomSequence, start: Timestamp) -> bool {
        for pattern in self.patterns {
            if let Some(room_a) = pattern.match_at(sequence, start) {
                pattern.apply(sequence, start, room_a);
                return true;
            }
        }
        false
    }

    /// One sweep over `range`, returning the number of corrections.
    pub fn smooth_pass(&self, sequence: &mut RoomSequence, range: TimeRange) -> usize {
        range
            .iter()
            .filter(|&start| self.smooth(sequence, start))
            .count()
    }

    /// Sweep until a pass makes no correction.
    pub fn smooth_until_stable(
        &self,
        receiver: MoteId,
        sequence: &mut RoomSequence,
        range: TimeRange,
        max_passes: usize,
    ) -> Result<SmoothingReport> {
        let mut report = SmoothingReport::default();
        loop {
            let corrected = self.smooth_pass(sequence, range);
            report.passes += 1;
            report.corrections += corrected;
            debug!(
                "mote {} smoothing pass {}: corrected {} patterns",
                receiver, report.passes, corrected
            );
            if corrected == 0 {
                return Ok(report);
            }
            if report.passes >= max_passes {
                return Err(LocatorError::NotConverged {
                    receiver,
                    passes: report.passes,
                });
            }
        }
    }
}
