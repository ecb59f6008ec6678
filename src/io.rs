//! Reading raw mote logs and writing per-receiver room timelines.

use flate2::read::GzDecoder;
use log::warn;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{LocatorError, Result};
use crate::observation::Observation;
use crate::store::{ObservationStore, RoomSequence};
use crate::types::{MoteId, Timestamp};

const SENDER_FIELD: usize = 0;
const READING_FIELD: usize = 2;
const TIME_FIELD: usize = 4;

/// One row of the master index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub receiver_id: MoteId,
    pub path: PathBuf,
}

/// Outcome of loading one receiver's log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub records: usize,
    pub rejected: usize,
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Read `receiver_id,filename` rows. Relative filenames resolve against the
/// index's own directory.
pub fn read_master_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_master_index(open_reader(path)?, base)
}

pub fn parse_master_index<R: BufRead>(reader: R, base: &Path) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.splitn(2, ',').map(str::trim);
        let (id_field, file_field) = match (fields.next(), fields.next()) {
            (Some(id), Some(file)) if !file.is_empty() => (id, file),
            _ => {
                return Err(LocatorError::Parse {
                    line: idx + 1,
                    reason: format!("expected 'receiver_id,filename', got '{}'", trimmed),
                })
            }
        };
        let receiver_id = id_field.parse::<MoteId>().map_err(|e| LocatorError::Parse {
            line: idx + 1,
            reason: format!("receiver id '{}': {}", id_field, e),
        })?;

        let file = Path::new(file_field);
        let path = if file.is_absolute() {
            file.to_path_buf()
        } else {
            base.join(file)
        };
        entries.push(IndexEntry { receiver_id, path });
    }
    Ok(entries)
}

fn parse_field(fields: &[&str], index: usize, name: &str, line: usize) -> Result<i64> {
    fields[index].parse::<i64>().map_err(|e| LocatorError::Parse {
        line,
        reason: format!("{} '{}': {}", name, fields[index], e),
    })
}

/// Parse one whitespace-separated raw record into an observation.
pub fn parse_record(
    line_number: usize,
    line: &str,
    receiver_id: MoteId,
    mobile_id_cutoff: MoteId,
) -> Result<Observation> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= TIME_FIELD {
        return Err(LocatorError::Parse {
            line: line_number,
            reason: format!("expected at least {} fields, got {}", TIME_FIELD + 1, fields.len()),
        });
    }

    let sender = parse_field(&fields, SENDER_FIELD, "sender id", line_number)?;
    let reading = parse_field(&fields, READING_FIELD, "signal reading", line_number)?;
    let time: Timestamp = parse_field(&fields, TIME_FIELD, "global time", line_number)?;

    Observation::classify(time, receiver_id, sender, reading, mobile_id_cutoff)
}

/// Build a receiver's store from its raw log. Bad records are logged and
/// skipped; only I/O failures abort.
pub fn parse_receiver_log<R: BufRead>(
    reader: R,
    receiver_id: MoteId,
    mobile_id_cutoff: MoteId,
) -> Result<(ObservationStore, LoadReport)> {
    let mut store = ObservationStore::new(receiver_id);
    let mut report = LoadReport::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let outcome = parse_record(idx + 1, &line, receiver_id, mobile_id_cutoff)
            .and_then(|observation| store.record(observation));
        match outcome {
            Ok(()) => report.records += 1,
            Err(e) => {
                warn!("mote {}: skipping record: {}", receiver_id, e);
                report.rejected += 1;
            }
        }
    }
    Ok((store, report))
}

pub fn read_receiver_log(
    path: &Path,
    receiver_id: MoteId,
    mobile_id_cutoff: MoteId,
) -> Result<(ObservationStore, LoadReport)> {
    parse_receiver_log(open_reader(path)?, receiver_id, mobile_id_cutoff)
}

/// Write `timestamp room` lines, six columns each, skipping unknown rooms.
pub fn write_timeline<W: Write>(writer: &mut W, sequence: &RoomSequence) -> std::io::Result<usize> {
    let mut written = 0;
    for (time, room) in sequence.known() {
        writeln!(writer, "{:6}{:6}", time, room)?;
        written += 1;
    }
    Ok(written)
}

/// Path of a receiver's timeline: the stub with the receiver id appended.
pub fn timeline_path(stub: &str, receiver_id: MoteId) -> PathBuf {
    PathBuf::from(format!("{}{}", stub, receiver_id))
}

pub fn write_timeline_file(stub: &str, receiver_id: MoteId, sequence: &RoomSequence) -> Result<PathBuf> {
    let path = timeline_path(stub, receiver_id);
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    write_timeline(&mut writer, sequence)?;
    writer.flush()?;
    Ok(path)
}
