use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::header;

/// Parsed contents of a session parameter file.
///
/// One instance per session, immutable after parsing. All structural
/// metadata for the flat binary sample files comes from here; the sample
/// files themselves carry no header of their own.
#[derive(Debug, Clone)]
pub struct SessionHeader {
    /// Spike-detection channel groups, one inner list per probe shank,
    /// in the order the header declares them. Channel indices are
    /// 0-based positions in the acquisition channel order.
    pub channel_groups: Vec<Vec<usize>>,
    /// Sample rate of the wideband acquisition (Hz)
    pub sampling_rate_wideband: f64,
    /// Sample rate of the downsampled field-potential file (Hz)
    pub sampling_rate_lfp: f64,
    /// Total number of acquisition channels, including any auxiliary
    /// channels that belong to no spike-detection group
    pub total_channel_count: usize,
    /// Number of samples stored per spike waveform snippet
    /// (0 when the header declares no spike-detection groups)
    pub spike_waveform_sample_count: usize,
}

impl SessionHeader {
    /// Sum of channel counts across all spike-detection groups. This can be
    /// smaller than `total_channel_count` when auxiliary/analog channels
    /// are excluded from spike detection.
    pub fn grouped_channel_count(&self) -> usize {
        self.channel_groups.iter().map(|g| g.len()).sum()
    }
}

/// An ordered set of channel indices belonging to one physical probe shank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelGroup {
    /// Position of this shank in the header's declaration order
    pub index: usize,
    /// Channel indices in declared (depth) order
    pub channels: Vec<usize>,
}

/// One row of the electrode metadata table.
///
/// Rows are appended in shank order and, within a shank, in the shank's
/// declared channel order. Consumers index into the table by position, so
/// that ordering is load-bearing.
#[derive(Debug, Clone)]
pub struct ElectrodeRecord {
    /// Electrode position in probe coordinates; NaN when unknown
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Measured impedance (Ω); NaN when unknown
    pub impedance: f64,
    /// Anatomical location, "unknown" when not provided
    pub location: String,
    /// Hardware filtering description, "unknown" when not provided
    pub filtering: String,
    /// Index of the owning shank in resolution order
    pub group_index: usize,
    /// 0-indexed position of this electrode within its shank
    pub shank_electrode_number: usize,
    /// Physical acquisition channel this electrode was recorded on
    pub amp_channel: usize,
}

/// Named descriptor for one shank's group of electrodes.
#[derive(Debug, Clone)]
pub struct ElectrodeGroupInfo {
    /// Group name, "shank0", "shank1", ...
    pub name: String,
    /// Human-readable description of the shank
    pub description: String,
    /// Number of electrodes in the group
    pub channel_count: usize,
}

/// How the series writer reacts when an electrode association cannot be
/// honored as requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Fail the write with an error
    Strict,
    /// Fall back to associating the full registered electrode set and
    /// emit a warning
    FallbackWithWarning,
}

/// Per-chunk compression applied to stored series data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Store raw little-endian sample bytes
    None,
    /// Compress each chunk with zstd at the given level
    Zstd(i32),
}

/// Session and subject provenance stored alongside the converted data.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub session_id: String,
    pub subject_id: String,
    pub species: String,
    pub genotype: String,
    /// Session start timestamp, ISO 8601
    pub session_start: String,
    pub experimenter: String,
    pub lab: String,
    pub institution: String,
    pub related_publications: Vec<String>,
}

/// A session directory together with its parsed header.
///
/// Every pipeline stage takes this by reference instead of re-deriving
/// paths from ambient conventions. The directory name is used verbatim as
/// the session id; subject identity is never guessed from it and is
/// supplied separately in [`Provenance`].
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub header: SessionHeader,
}

impl SessionContext {
    /// Opens a session directory, parsing `<dir>/<id>.xml` where `<id>` is
    /// the directory's file name.
    pub fn open<P: AsRef<Path>>(session_dir: P) -> Result<Self> {
        let session_dir = session_dir.as_ref().to_path_buf();
        let session_id = session_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let header = header::parse_header(session_dir.join(format!("{}.xml", session_id)))?;
        Ok(SessionContext {
            session_id,
            session_dir,
            header,
        })
    }

    /// Path of the wideband sample file, `<dir>/<id>.dat`
    pub fn wideband_path(&self) -> PathBuf {
        self.session_dir.join(format!("{}.dat", self.session_id))
    }

    /// Path of the field-potential sample file: `<dir>/<id>.lfp`, falling
    /// back to the older `.eeg` extension when no `.lfp` file exists.
    pub fn lfp_path(&self) -> PathBuf {
        let lfp = self.session_dir.join(format!("{}.lfp", self.session_id));
        if lfp.exists() {
            return lfp;
        }
        self.session_dir.join(format!("{}.eeg", self.session_id))
    }

    /// Whether this session has wideband raw data on disk. Not all
    /// sessions do; callers branch here instead of catching a missing-file
    /// error.
    pub fn has_wideband(&self) -> bool {
        self.wideband_path().exists()
    }

    /// Whether this session has a field-potential file on disk.
    pub fn has_lfp(&self) -> bool {
        self.lfp_path().exists()
    }
}
