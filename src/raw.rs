//! Raw sample reading.
//!
//! Wideband and LFP files are flat blobs of channel-interleaved signed
//! 16-bit little-endian samples with no header, checksum, or framing of
//! their own; position in the file is the only addressing mechanism.
//! Channel count comes from the separately parsed session header.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use ndarray::{Array2, Axis};

use crate::error::{ConvertError, Result};

/// Bytes per sample in the raw files
const BYTES_PER_SAMPLE: usize = 2;
/// Number of time samples a stub read is bounded to. Stub reads exist to
/// speed up development iteration, not as a statistically meaningful
/// subsample.
pub const STUB_SAMPLE_COUNT: usize = 50;
/// Buffer size for raw file reads
const READ_BUFFER_SIZE: usize = 65536;

/// Reads a raw sample file into a `(time, channel)` array.
///
/// When `stub` is set, at most [`STUB_SAMPLE_COUNT`] time samples are read;
/// the stub content is a strict prefix of the non-stub read.
///
/// Fails with [`ConvertError::MissingRawFile`] when the path does not
/// exist, and with [`ConvertError::RawFileSize`] when the byte length is
/// not a whole number of `total_channel_count`-wide frames.
pub fn read_samples<P: AsRef<Path>>(
    path: P,
    total_channel_count: usize,
    stub: bool,
) -> Result<Array2<i16>> {
    let path = path.as_ref();
    let (file, total_frames) = open_raw(path, total_channel_count)?;

    let frames = if stub {
        total_frames.min(STUB_SAMPLE_COUNT)
    } else {
        total_frames
    };

    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut samples = vec![0i16; frames * total_channel_count];
    reader.read_i16_into::<LittleEndian>(&mut samples)?;

    into_block(samples, frames, total_channel_count)
}

/// Subsets a sample block to the given channel columns, in the order
/// given. Used with the resolver's flattened channel vector to drop
/// auxiliary channels that belong to no probe shank.
pub fn select_channels(block: &Array2<i16>, channels: &[usize]) -> Array2<i16> {
    block.select(Axis(1), channels)
}

/// Streaming reader yielding bounded row-chunks of a raw sample file.
///
/// Keeps per-chunk memory bounded for long recordings; each yielded array
/// has `chunk_rows` rows except possibly the last.
pub struct RawChunks {
    reader: BufReader<File>,
    total_channel_count: usize,
    chunk_rows: usize,
    frames_left: usize,
}

impl RawChunks {
    /// Opens a raw file for chunked reading, applying the same existence
    /// and frame-alignment checks as [`read_samples`].
    pub fn open<P: AsRef<Path>>(
        path: P,
        total_channel_count: usize,
        chunk_rows: usize,
    ) -> Result<Self> {
        let (file, total_frames) = open_raw(path.as_ref(), total_channel_count)?;
        Ok(RawChunks {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            total_channel_count,
            chunk_rows: chunk_rows.max(1),
            frames_left: total_frames,
        })
    }

    /// Number of time samples not yet yielded.
    pub fn frames_left(&self) -> usize {
        self.frames_left
    }
}

impl Iterator for RawChunks {
    type Item = Result<Array2<i16>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frames_left == 0 {
            return None;
        }
        let frames = self.frames_left.min(self.chunk_rows);
        let mut samples = vec![0i16; frames * self.total_channel_count];
        if let Err(e) = self.reader.read_i16_into::<LittleEndian>(&mut samples) {
            self.frames_left = 0;
            return Some(Err(e.into()));
        }
        self.frames_left -= frames;
        Some(into_block(samples, frames, self.total_channel_count))
    }
}

/// Opens a raw file and returns it with its frame count, validating
/// existence and frame alignment.
fn open_raw(path: &Path, total_channel_count: usize) -> Result<(File, usize)> {
    if !path.exists() {
        return Err(ConvertError::MissingRawFile(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let length = file.metadata()?.len();
    let frame_bytes = BYTES_PER_SAMPLE * total_channel_count;

    // A zero-channel frame has no width; no byte length can be framed by it.
    if frame_bytes == 0 || length % frame_bytes as u64 != 0 {
        return Err(ConvertError::RawFileSize {
            path: path.to_path_buf(),
            length,
            frame_bytes,
        });
    }

    Ok((file, (length / frame_bytes as u64) as usize))
}

/// Reshapes an interleaved sample vector to `(time, channel)`.
fn into_block(samples: Vec<i16>, frames: usize, channels: usize) -> Result<Array2<i16>> {
    Array2::from_shape_vec((frames, channels), samples)
        .map_err(|e| ConvertError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}
