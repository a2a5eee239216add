//! Series and container writing.
//!
//! Each converted session becomes one container file holding provenance,
//! the electrode table, and any number of named sample series. The layout
//! is a write-once sequence of tagged sections, little-endian throughout,
//! with length-prefixed UTF-8 strings. There is no append or update mode;
//! overwrite is all-or-nothing.
//!
//! Series data is stored in row-chunks. Chunks may be zstd-compressed; the
//! chunk header records both the raw and the stored byte length. A chunk
//! with zero rows terminates the series, which lets chunked writes stream
//! without patching any section header afterwards.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use log::{info, warn};
use ndarray::Array2;

use crate::electrodes::ElectrodeTable;
use crate::error::{ConvertError, Result};
use crate::types::{Compression, Provenance, RecoveryPolicy};

/// File magic, "EPHC"
pub const CONTAINER_MAGIC: [u8; 4] = *b"EPHC";
/// Container layout version
pub const CONTAINER_VERSION: u16 = 1;

/// Section tags
pub const TAG_PROVENANCE: u8 = 0x01;
pub const TAG_ELECTRODE_TABLE: u8 = 0x02;
pub const TAG_SERIES: u8 = 0x03;
pub const TAG_END: u8 = 0xFF;

/// Compression codes stored in series sections
const CODEC_NONE: u8 = 0;
const CODEC_ZSTD: u8 = 1;

/// Rows per chunk so that one chunk spans roughly an hour of recording.
/// A memory/throughput trade-off, not a semantic boundary.
pub fn hour_chunk_rows(sampling_rate: f64) -> usize {
    ((sampling_rate * 3600.0) as usize).max(1)
}

/// Parameters of one stored series.
#[derive(Debug, Clone)]
pub struct SeriesSpec {
    /// Series name, unique within the container by convention
    pub name: String,
    pub description: String,
    /// Sampling rate the series is stamped with (Hz)
    pub sampling_rate: f64,
    /// Raw-unit to physical-unit scalar (e.g. volts per bit)
    pub conversion: f64,
    /// Electrode-table row indices associated with the series' channels.
    /// When `None`, a positional default is derived; see
    /// [`ContainerWriter::write_series`].
    pub electrode_rows: Option<Vec<usize>>,
    pub compression: Compression,
    pub recovery: RecoveryPolicy,
}

impl SeriesSpec {
    pub fn new(name: &str, description: &str, sampling_rate: f64) -> Self {
        SeriesSpec {
            name: name.to_string(),
            description: description.to_string(),
            sampling_rate,
            conversion: 1.0,
            electrode_rows: None,
            compression: Compression::None,
            recovery: RecoveryPolicy::Strict,
        }
    }
}

/// Write-once container writer.
///
/// Sections may be written in any order, except that the electrode table
/// must precede any series (the series' electrode association is resolved
/// against the registered table).
pub struct ContainerWriter {
    writer: BufWriter<File>,
    electrode_rows: Option<usize>,
    finalized: bool,
}

impl ContainerWriter {
    /// Creates the container file, truncating any previous artifact at the
    /// same path.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&CONTAINER_MAGIC)?;
        writer.write_u16::<LittleEndian>(CONTAINER_VERSION)?;
        Ok(ContainerWriter {
            writer,
            electrode_rows: None,
            finalized: false,
        })
    }

    /// Writes the session/subject provenance section.
    pub fn write_provenance(&mut self, provenance: &Provenance) -> Result<()> {
        self.check_open()?;
        self.writer.write_u8(TAG_PROVENANCE)?;
        write_str(&mut self.writer, &provenance.session_id)?;
        write_str(&mut self.writer, &provenance.subject_id)?;
        write_str(&mut self.writer, &provenance.species)?;
        write_str(&mut self.writer, &provenance.genotype)?;
        write_str(&mut self.writer, &provenance.session_start)?;
        write_str(&mut self.writer, &provenance.experimenter)?;
        write_str(&mut self.writer, &provenance.lab)?;
        write_str(&mut self.writer, &provenance.institution)?;
        self.writer
            .write_u32::<LittleEndian>(provenance.related_publications.len() as u32)?;
        for publication in &provenance.related_publications {
            write_str(&mut self.writer, publication)?;
        }
        Ok(())
    }

    /// Writes the electrode table section and registers its row count for
    /// later series association.
    pub fn write_electrode_table(&mut self, table: &ElectrodeTable) -> Result<()> {
        self.check_open()?;
        self.writer.write_u8(TAG_ELECTRODE_TABLE)?;

        self.writer
            .write_u32::<LittleEndian>(table.groups.len() as u32)?;
        for group in &table.groups {
            write_str(&mut self.writer, &group.name)?;
            write_str(&mut self.writer, &group.description)?;
            self.writer
                .write_u32::<LittleEndian>(group.channel_count as u32)?;
        }

        self.writer
            .write_u32::<LittleEndian>(table.records.len() as u32)?;
        for record in &table.records {
            self.writer.write_f64::<LittleEndian>(record.x)?;
            self.writer.write_f64::<LittleEndian>(record.y)?;
            self.writer.write_f64::<LittleEndian>(record.z)?;
            self.writer.write_f64::<LittleEndian>(record.impedance)?;
            write_str(&mut self.writer, &record.location)?;
            write_str(&mut self.writer, &record.filtering)?;
            self.writer
                .write_u32::<LittleEndian>(record.group_index as u32)?;
            self.writer
                .write_u32::<LittleEndian>(record.shank_electrode_number as u32)?;
            self.writer
                .write_u32::<LittleEndian>(record.amp_channel as u32)?;
        }

        self.electrode_rows = Some(table.records.len());
        Ok(())
    }

    /// Writes a whole sample block as one series.
    ///
    /// When `spec.electrode_rows` is `None`, the association defaults
    /// positionally: if the block's channel count does not exceed the
    /// registered electrode rows, the first N rows are assumed; otherwise
    /// the full registered set applies. Coincidentally matching channel
    /// counts make this heuristic silently pick the wrong electrodes, so
    /// callers with channel subsets should pass explicit rows.
    pub fn write_series(&mut self, spec: &SeriesSpec, block: &Array2<i16>) -> Result<()> {
        self.check_open()?;
        let rows = self.resolve_electrode_rows(spec, block.ncols())?;
        self.write_series_header(spec, &rows)?;
        self.write_chunk(block, spec.compression)?;
        self.write_end_chunk()
    }

    /// Writes a series from a lazily-produced sequence of row-chunks.
    ///
    /// The electrode association is resolved against the first chunk's
    /// channel count. Chunk boundaries are the producer's business;
    /// [`hour_chunk_rows`] gives the conventional one-hour bound.
    pub fn write_series_chunked<I>(&mut self, spec: &SeriesSpec, chunks: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Array2<i16>>>,
    {
        self.check_open()?;
        let mut chunks = chunks.into_iter();

        let first = match chunks.next() {
            Some(chunk) => chunk?,
            None => {
                // An empty recording still produces a series section.
                let rows = self.resolve_electrode_rows(spec, 0)?;
                self.write_series_header(spec, &rows)?;
                return self.write_end_chunk();
            }
        };

        let rows = self.resolve_electrode_rows(spec, first.ncols())?;
        self.write_series_header(spec, &rows)?;
        self.write_chunk(&first, spec.compression)?;

        let mut total_rows = first.nrows();
        for chunk in chunks {
            let chunk = chunk?;
            self.write_chunk(&chunk, spec.compression)?;
            total_rows += chunk.nrows();
        }
        info!(
            "series '{}': wrote {} samples in chunks",
            spec.name, total_rows
        );
        self.write_end_chunk()
    }

    /// Terminates the container with the end tag and flushes it.
    pub fn finalize(mut self) -> Result<()> {
        self.check_open()?;
        self.writer.write_u8(TAG_END)?;
        self.writer.flush()?;
        self.finalized = true;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.finalized {
            return Err(ConvertError::ContainerFinalized);
        }
        Ok(())
    }

    /// Resolves which electrode-table rows a series is associated with.
    fn resolve_electrode_rows(
        &self,
        spec: &SeriesSpec,
        channel_count: usize,
    ) -> Result<Vec<usize>> {
        let table_rows = self.electrode_rows.ok_or(ConvertError::ElectrodeTableMissing)?;

        match &spec.electrode_rows {
            Some(explicit) => {
                if let Some(&bad) = explicit.iter().find(|&&i| i >= table_rows) {
                    match spec.recovery {
                        RecoveryPolicy::Strict => {
                            return Err(ConvertError::ElectrodeIndexOutOfRange {
                                index: bad,
                                rows: table_rows,
                            });
                        }
                        RecoveryPolicy::FallbackWithWarning => {
                            warn!(
                                "series '{}': electrode row {} out of range ({} rows); \
                                 associating the full electrode table instead",
                                spec.name, bad, table_rows
                            );
                            return Ok((0..table_rows).collect());
                        }
                    }
                }
                Ok(explicit.clone())
            }
            None if channel_count <= table_rows => Ok((0..channel_count).collect()),
            None => Ok((0..table_rows).collect()),
        }
    }

    fn write_series_header(&mut self, spec: &SeriesSpec, rows: &[usize]) -> Result<()> {
        self.writer.write_u8(TAG_SERIES)?;
        write_str(&mut self.writer, &spec.name)?;
        write_str(&mut self.writer, &spec.description)?;
        self.writer.write_f64::<LittleEndian>(spec.sampling_rate)?;
        self.writer.write_f64::<LittleEndian>(spec.conversion)?;
        self.writer.write_u8(match spec.compression {
            Compression::None => CODEC_NONE,
            Compression::Zstd(_) => CODEC_ZSTD,
        })?;
        self.writer.write_u32::<LittleEndian>(rows.len() as u32)?;
        for &row in rows {
            self.writer.write_u32::<LittleEndian>(row as u32)?;
        }
        Ok(())
    }

    fn write_chunk(&mut self, block: &Array2<i16>, compression: Compression) -> Result<()> {
        let mut raw = Vec::with_capacity(block.len() * 2);
        for &sample in block.iter() {
            raw.extend_from_slice(&sample.to_le_bytes());
        }

        let stored = match compression {
            Compression::None => raw,
            Compression::Zstd(level) => {
                let raw_len = raw.len();
                let compressed = zstd::encode_all(&raw[..], level)?;
                self.writer.write_u32::<LittleEndian>(block.nrows() as u32)?;
                self.writer.write_u32::<LittleEndian>(block.ncols() as u32)?;
                self.writer.write_u64::<LittleEndian>(raw_len as u64)?;
                self.writer
                    .write_u64::<LittleEndian>(compressed.len() as u64)?;
                self.writer.write_all(&compressed)?;
                return Ok(());
            }
        };

        self.writer.write_u32::<LittleEndian>(block.nrows() as u32)?;
        self.writer.write_u32::<LittleEndian>(block.ncols() as u32)?;
        self.writer.write_u64::<LittleEndian>(stored.len() as u64)?;
        self.writer.write_u64::<LittleEndian>(stored.len() as u64)?;
        self.writer.write_all(&stored)?;
        Ok(())
    }

    fn write_end_chunk(&mut self) -> Result<()> {
        // rows == 0 terminates the chunk stream.
        self.writer.write_u32::<LittleEndian>(0)?;
        self.writer.write_u32::<LittleEndian>(0)?;
        self.writer.write_u64::<LittleEndian>(0)?;
        self.writer.write_u64::<LittleEndian>(0)?;
        Ok(())
    }
}

fn write_str<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    writer.write_u32::<LittleEndian>(s.len() as u32)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}
