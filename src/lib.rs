//! Conversion of raw extracellular electrophysiology sessions into a
//! standardized container format.
//!
//! A session directory holds an XML parameter file and flat, headerless
//! binary sample files (channel-interleaved signed 16-bit, wideband and
//! downsampled LFP), plus optional spike-sorting output and behavioral
//! event logs. This crate parses the header, resolves probe-shank channel
//! groups, reads and subsets the raw samples, assembles an electrode
//! metadata table, and writes everything into one chunked, optionally
//! compressed container file per session.
//!
//! Every stage is a pure, single-pass transform; there is no shared state
//! between sessions, and batch drivers simply run one pipeline per session
//! directory.
//!
//! # Examples
//!
//! ```no_run
//! use ephys_convert::{
//!     build_electrode_table, read_samples, resolve_channel_groups, select_channels,
//!     ContainerWriter, ElectrodeAux, Provenance, SeriesSpec, SessionContext,
//! };
//!
//! fn main() -> ephys_convert::Result<()> {
//!     let ctx = SessionContext::open("data/Rat01_2024-03-01")?;
//!     let resolved = resolve_channel_groups(&ctx.header, None);
//!     let table = build_electrode_table(&resolved.groups, &ElectrodeAux::default())?;
//!
//!     let block = read_samples(ctx.lfp_path(), ctx.header.total_channel_count, false)?;
//!     let probe_only = select_channels(&block, &resolved.flat);
//!
//!     let mut writer = ContainerWriter::create("Rat01_2024-03-01.cont")?;
//!     writer.write_provenance(&Provenance::default())?;
//!     writer.write_electrode_table(&table)?;
//!     writer.write_series(
//!         &SeriesSpec::new("lfp", "field potential", ctx.header.sampling_rate_lfp),
//!         &probe_only,
//!     )?;
//!     writer.finalize()
//! }
//! ```

pub mod channels;
pub mod electrodes;
pub mod error;
pub mod events;
pub mod filter;
pub mod header;
pub mod raw;
pub mod types;
pub mod writer;

pub use channels::{resolve_channel_groups, ResolvedChannels};
pub use electrodes::{build_electrode_table, ElectrodeAux, ElectrodeTable};
pub use error::{ConvertError, Result};
pub use events::{read_cluster_assignments, read_event_file, read_spike_times};
pub use filter::{
    bandpass_filter, next_power_of_2, parse_passband, phase_amplitude, FilterKind, Passband,
};
pub use header::parse_header;
pub use raw::{read_samples, select_channels, RawChunks, STUB_SAMPLE_COUNT};
pub use types::{
    ChannelGroup, Compression, ElectrodeGroupInfo, ElectrodeRecord, Provenance, RecoveryPolicy,
    SessionContext, SessionHeader,
};
pub use writer::{hour_chunk_rows, ContainerWriter, SeriesSpec};

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
