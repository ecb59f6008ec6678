use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::LocatorConfig;
use crate::error::{LocatorError, Result};
use crate::estimator::LocationEstimator;
use crate::io::{read_receiver_log, IndexEntry, LoadReport};
use crate::smoothing::PatternSmoother;
use crate::store::{Dataset, RoomSequence};
use crate::types::MoteId;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverSummary {
    pub receiver: MoteId,
    pub snapshots: usize,
    pub rejected_records: usize,
    pub assigned: usize,
    pub unknown: usize,
    pub corrections: usize,
    pub passes: usize,
}

#[derive(Clone, Debug)]
pub struct ReceiverResult {
    pub receiver: MoteId,
    pub sequence: RoomSequence,
    pub summary: ReceiverSummary,
}

#[derive(Serialize)]
pub struct RunSummary<'a> {
    pub generated_at: String,
    pub config: &'a LocatorConfig,
    pub receivers: Vec<ReceiverSummary>,
}

impl<'a> RunSummary<'a> {
    pub fn new(config: &'a LocatorConfig, results: &[ReceiverResult]) -> Self {
        RunSummary {
            generated_at: Utc::now().to_rfc3339(),
            config,
            receivers: results.iter().map(|r| r.summary.clone()).collect(),
        }
    }
}

/// Load every receiver listed in the index into one dataset.
///
/// A later entry for an already-loaded receiver replaces the earlier one.
pub fn load_dataset(
    index: &[IndexEntry],
    mobile_id_cutoff: MoteId,
) -> Result<(Dataset, BTreeMap<MoteId, LoadReport>)> {
    let mut dataset = Dataset::new();
    let mut reports = BTreeMap::new();
    for entry in index {
        info!("reading {} for mote {}", entry.path.display(), entry.receiver_id);
        let (store, report) = read_receiver_log(&entry.path, entry.receiver_id, mobile_id_cutoff)?;
        if report.rejected > 0 {
            warn!(
                "mote {}: rejected {} of {} records",
                entry.receiver_id,
                report.rejected,
                report.records + report.rejected
            );
        }
        if dataset.insert(store).is_some() {
            warn!("mote {} listed more than once, keeping {}", entry.receiver_id, entry.path.display());
        }
        reports.insert(entry.receiver_id, report);
    }
    Ok((dataset, reports))
}

/// Estimate then smooth one receiver's room sequence.
///
/// Smoothing only starts once the whole range has been estimated.
pub fn locate_receiver(
    dataset: &Dataset,
    config: &LocatorConfig,
    receiver: MoteId,
    rejected_records: usize,
) -> Result<ReceiverResult> {
    let estimator = LocationEstimator::new(dataset, &config.kernel, config.threshold_mw);
    let mut sequence = RoomSequence::new();
    estimator.identify_range(receiver, config.time_range, &mut sequence);

    let smoother = PatternSmoother::new(&config.patterns);
    let report = smoother.smooth_until_stable(
        receiver,
        &mut sequence,
        config.time_range,
        config.max_smoothing_passes,
    )?;

    let unknown = sequence.unknown_count();
    let summary = ReceiverSummary {
        receiver,
        snapshots: dataset.get(receiver).map(|s| s.len()).unwrap_or(0),
        rejected_records,
        assigned: sequence.len() - unknown,
        unknown,
        corrections: report.corrections,
        passes: report.passes,
    };
    info!(
        "mote {}: {} located, {} unknown, corrected {} patterns in {} passes",
        receiver, summary.assigned, summary.unknown, summary.corrections, summary.passes
    );

    Ok(ReceiverResult {
        receiver,
        sequence,
        summary,
    })
}

/// Locate every receiver in the dataset, spreading receivers over worker threads.
///
/// Results come back in ascending receiver id regardless of scheduling.
pub fn locate_all(
    dataset: &Dataset,
    config: &LocatorConfig,
    reports: &BTreeMap<MoteId, LoadReport>,
) -> Result<Vec<ReceiverResult>> {
    config.validate()?;
    let receivers: Vec<MoteId> = dataset.receivers().collect();
    if receivers.is_empty() {
        return Ok(Vec::new());
    }

    let workers = config.effective_workers().clamp(1, receivers.len());
    let chunk_size = (receivers.len() + workers - 1) / workers;

    let joined = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = receivers
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move |_| {
                    chunk
                        .iter()
                        .map(|&receiver| {
                            let rejected = reports.get(&receiver).map(|r| r.rejected).unwrap_or(0);
                            locate_receiver(dataset, config, receiver, rejected)
                        })
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| LocatorError::WorkerPanicked))
            .collect::<Vec<_>>()
    })
    .map_err(|_| LocatorError::WorkerPanicked)?;

    let mut results = Vec::with_capacity(receivers.len());
    for chunk in joined {
        results.extend(chunk??);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use crate::observation::Observation;
    use crate::store::ObservationStore;
    use crate::types::{TimeRange, Timestamp, UNKNOWN_ROOM};

    const ROOM_A: MoteId = 10_050;
    const ROOM_B: MoteId = 10_051;

    /// Receiver that sits in room A with a one-sample flicker to B at t=3.
    fn flicker_store(receiver: MoteId) -> ObservationStore {
        let mut store = ObservationStore::new(receiver);
        for t in 0..10 {
            let room = if t == 3 { ROOM_B } else { ROOM_A };
            store.record(Observation::stationary(t, receiver, room, 40)).unwrap();
        }
        store
    }

    fn test_config(workers: usize) -> LocatorConfig {
        LocatorConfig {
            kernel: Kernel::instant(),
            time_range: TimeRange::new(0, 10),
            workers,
            ..LocatorConfig::default()
        }
    }

    #[test]
    fn test_locate_receiver_smooths_flicker() {
        let dataset: Dataset = vec![flicker_store(1)].into_iter().collect();
        let config = test_config(1);

        let result = locate_receiver(&dataset, &config, 1, 0).unwrap();
        assert_eq!(result.sequence.get(3), Some(ROOM_A));
        assert_eq!(result.summary.assigned, 10);
        assert_eq!(result.summary.corrections, 1);
        assert_eq!(result.summary.passes, 2);
        assert_eq!(result.summary.snapshots, 10);
    }

    #[test]
    fn test_receiver_without_data_is_all_unknown() {
        let dataset: Dataset = vec![ObservationStore::new(5)].into_iter().collect();
        let config = test_config(1);

        let result = locate_receiver(&dataset, &config, 5, 2).unwrap();
        assert_eq!(result.sequence.len(), 10);
        assert!(result.sequence.iter().all(|(_, room)| room == UNKNOWN_ROOM));
        assert_eq!(result.summary.unknown, 10);
        assert_eq!(result.summary.rejected_records, 2);
        assert_eq!(result.sequence.known().count(), 0);
    }

    #[test]
    fn test_range_ending_at_last_timestamp() {
        let start = Timestamp::MAX - 3;
        let mut store = ObservationStore::new(1);
        for t in start..Timestamp::MAX {
            store.record(Observation::stationary(t, 1, ROOM_A, 40)).unwrap();
        }
        let dataset: Dataset = vec![store, ObservationStore::new(2)].into_iter().collect();
        let config = LocatorConfig {
            kernel: Kernel::default(),
            time_range: TimeRange::new(start, Timestamp::MAX),
            ..test_config(1)
        };
        assert!(config.validate().is_ok());

        let located = locate_receiver(&dataset, &config, 1, 0).unwrap();
        assert_eq!(located.summary.assigned, 3);
        assert!(located.sequence.iter().all(|(_, room)| room == ROOM_A));

        let empty = locate_receiver(&dataset, &config, 2, 0).unwrap();
        assert_eq!(empty.summary.unknown, 3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dataset: Dataset = (1..=7).map(flicker_store).collect();
        let reports = BTreeMap::new();

        let sequential = locate_all(&dataset, &test_config(1), &reports).unwrap();
        let parallel = locate_all(&dataset, &test_config(3), &reports).unwrap();

        assert_eq!(sequential.len(), 7);
        let ids: Vec<MoteId> = parallel.iter().map(|r| r.receiver).collect();
        assert_eq!(ids, (1..=7).collect::<Vec<_>>());
        for (a, b) in sequential.iter().zip(parallel.iter()) {
            assert_eq!(a.sequence, b.sequence);
            assert_eq!(a.summary, b.summary);
        }
    }

    #[test]
    fn test_empty_dataset() {
        let results = locate_all(&Dataset::new(), &test_config(0), &BTreeMap::new()).unwrap();
        assert!(results.is_empty());
    }
}
