//! Auxiliary text-file readers.
//!
//! Sessions carry behavioral events as tab-separated two-column files
//! (time in milliseconds, label), and sorted spike output as per-shank
//! plain-text files: `.res` files with one spike-time sample index per
//! line, and `.clu` files whose first line is the cluster count (metadata,
//! not a data row) followed by one cluster id per spike.
//!
//! Missing event or spike files are expected in some sessions; callers
//! branch on file existence rather than catching a missing-file error.

use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};

/// One behavioral event.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochEvent {
    /// Event time in milliseconds from session start
    pub time_ms: f64,
    pub label: String,
}

/// Cluster assignments for one shank's sorted spikes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignments {
    /// Number of clusters declared by the file's count line
    pub n_clusters: usize,
    /// One cluster id per spike, aligned with the shank's spike times
    pub assignments: Vec<u32>,
}

/// Reads a tab-separated event file (`time_ms<TAB>label` per line).
pub fn read_event_file<P: AsRef<Path>>(path: P) -> Result<Vec<EpochEvent>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;

    let mut events = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let malformed = || ConvertError::MalformedEventLine {
            path: path.to_path_buf(),
            line: number + 1,
        };
        let (time, label) = line.split_once('\t').ok_or_else(malformed)?;
        let time_ms = time.trim().parse::<f64>().map_err(|_| malformed())?;
        events.push(EpochEvent {
            time_ms,
            label: label.trim().to_string(),
        });
    }
    Ok(events)
}

/// Reads a spike-time file: one integer sample index per line.
pub fn read_spike_times<P: AsRef<Path>>(path: P) -> Result<Vec<i64>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;

    let mut times = Vec::with_capacity(text.lines().count());
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value = line
            .trim()
            .parse::<i64>()
            .map_err(|_| ConvertError::MalformedClusterFile {
                path: path.to_path_buf(),
                line: number + 1,
            })?;
        times.push(value);
    }
    Ok(times)
}

/// Reads a cluster-assignment file. The first line is the cluster count
/// and is never returned as an assignment.
pub fn read_cluster_assignments<P: AsRef<Path>>(path: P) -> Result<ClusterAssignments> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().enumerate();

    let malformed = |number: usize| ConvertError::MalformedClusterFile {
        path: path.to_path_buf(),
        line: number + 1,
    };

    let n_clusters = match lines.next() {
        Some((number, line)) => line.trim().parse::<usize>().map_err(|_| malformed(number))?,
        None => return Err(malformed(0)),
    };

    let mut assignments = Vec::new();
    for (number, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let id = line.trim().parse::<u32>().map_err(|_| malformed(number))?;
        assignments.push(id);
    }

    Ok(ClusterAssignments {
        n_clusters,
        assignments,
    })
}
