//! Session header parsing.
//!
//! NeuroScope-style sessions keep all structural metadata in one XML
//! parameter file per session. The binary sample files are headerless, so
//! this parse is the only source of channel counts and sampling rates for
//! the rest of the pipeline.

use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::{ConvertError, Result};
use crate::types::SessionHeader;

const CHANNEL_COUNT_PATH: &str = "acquisitionSystem/nChannels";
const WIDEBAND_RATE_PATH: &str = "acquisitionSystem/samplingRate";
const LFP_RATE_PATH: &str = "fieldPotentials/lfpSamplingRate";
const CHANNEL_GROUPS_PATH: &str = "spikeDetection/channelGroups";
const WAVEFORM_SAMPLES_PATH: &str = "spikeDetection/channelGroups/group/nSamples";

/// Parses a session parameter file into a [`SessionHeader`].
///
/// A single deterministic parse with no retries. A required key path that
/// is absent fails with [`ConvertError::MissingHeaderField`]; the calling
/// dataset script decides whether that is fatal.
pub fn parse_header<P: AsRef<Path>>(path: P) -> Result<SessionHeader> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_header_str(&text)
}

/// Parses session header XML from an in-memory string.
pub fn parse_header_str(text: &str) -> Result<SessionHeader> {
    let doc =
        Document::parse(text).map_err(|e| ConvertError::MalformedHeader(e.to_string()))?;
    let root = doc.root_element();

    let acquisition = require_child(root, "acquisitionSystem", CHANNEL_COUNT_PATH)?;
    let total_channel_count =
        parse_field::<usize>(acquisition, "nChannels", CHANNEL_COUNT_PATH)?;
    let sampling_rate_wideband =
        parse_field::<f64>(acquisition, "samplingRate", WIDEBAND_RATE_PATH)?;

    let field_potentials = require_child(root, "fieldPotentials", LFP_RATE_PATH)?;
    let sampling_rate_lfp =
        parse_field::<f64>(field_potentials, "lfpSamplingRate", LFP_RATE_PATH)?;

    let spike_detection = require_child(root, "spikeDetection", CHANNEL_GROUPS_PATH)?;
    let group_list = require_child(spike_detection, "channelGroups", CHANNEL_GROUPS_PATH)?;

    let mut channel_groups = Vec::new();
    let mut spike_waveform_sample_count = None;
    for group in group_list.children().filter(|n| n.has_tag_name("group")) {
        channel_groups.push(read_group_channels(group)?);

        // The waveform sample count is declared per group; the first
        // group's value stands for the session.
        if spike_waveform_sample_count.is_none() {
            spike_waveform_sample_count =
                Some(parse_field::<usize>(group, "nSamples", WAVEFORM_SAMPLES_PATH)?);
        }
    }

    Ok(SessionHeader {
        channel_groups,
        sampling_rate_wideband,
        sampling_rate_lfp,
        total_channel_count,
        // No spike-detection groups means no waveform extraction.
        spike_waveform_sample_count: spike_waveform_sample_count.unwrap_or(0),
    })
}

/// Reads the ordered channel list of one `<group>` element.
fn read_group_channels(group: Node) -> Result<Vec<usize>> {
    const PATH: &str = "spikeDetection/channelGroups/group/channels";
    let channels = require_child(group, "channels", PATH)?;

    let mut indices = Vec::new();
    for channel in channels.children().filter(|n| n.has_tag_name("channel")) {
        let text = channel.text().unwrap_or("").trim();
        let index = text
            .parse::<usize>()
            .map_err(|_| ConvertError::InvalidHeaderValue {
                field: PATH,
                value: text.to_string(),
            })?;
        indices.push(index);
    }
    Ok(indices)
}

/// Finds a direct child element, reporting the full key path on absence.
fn require_child<'a>(
    node: Node<'a, 'a>,
    tag: &str,
    path: &'static str,
) -> Result<Node<'a, 'a>> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .ok_or(ConvertError::MissingHeaderField(path))
}

/// Reads and parses the text content of a required leaf element.
fn parse_field<T: std::str::FromStr>(
    node: Node,
    tag: &str,
    path: &'static str,
) -> Result<T> {
    let leaf = require_child(node, tag, path)?;
    let text = leaf.text().unwrap_or("").trim();
    text.parse::<T>().map_err(|_| ConvertError::InvalidHeaderValue {
        field: path,
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_XML: &str = r#"<?xml version="1.0"?>
<parameters version="1.0" creator="neuroscope-2.0.0">
  <acquisitionSystem>
    <nBits>16</nBits>
    <nChannels>10</nChannels>
    <samplingRate>20000</samplingRate>
  </acquisitionSystem>
  <fieldPotentials>
    <lfpSamplingRate>1250</lfpSamplingRate>
  </fieldPotentials>
  <spikeDetection>
    <channelGroups>
      <group>
        <channels>
          <channel>0</channel>
          <channel>1</channel>
          <channel>2</channel>
          <channel>3</channel>
        </channels>
        <nSamples>32</nSamples>
        <peakSampleIndex>16</peakSampleIndex>
      </group>
      <group>
        <channels>
          <channel>4</channel>
          <channel>5</channel>
          <channel>6</channel>
          <channel>7</channel>
        </channels>
        <nSamples>32</nSamples>
      </group>
    </channelGroups>
  </spikeDetection>
</parameters>
"#;

    #[test]
    fn parses_full_header() {
        let header = parse_header_str(HEADER_XML).unwrap();
        assert_eq!(header.total_channel_count, 10);
        assert_eq!(header.sampling_rate_wideband, 20000.0);
        assert_eq!(header.sampling_rate_lfp, 1250.0);
        assert_eq!(header.spike_waveform_sample_count, 32);
        assert_eq!(header.channel_groups.len(), 2);
        assert_eq!(header.channel_groups[0], vec![0, 1, 2, 3]);
        assert_eq!(header.channel_groups[1], vec![4, 5, 6, 7]);
        assert_eq!(header.grouped_channel_count(), 8);
    }

    #[test]
    fn missing_lfp_rate_names_key_path() {
        let xml = r#"<parameters>
  <acquisitionSystem><nChannels>8</nChannels><samplingRate>20000</samplingRate></acquisitionSystem>
  <spikeDetection><channelGroups/></spikeDetection>
</parameters>"#;
        match parse_header_str(xml) {
            Err(ConvertError::MissingHeaderField(path)) => {
                assert_eq!(path, "fieldPotentials/lfpSamplingRate");
            }
            other => panic!("expected MissingHeaderField, got {:?}", other),
        }
    }

    #[test]
    fn empty_group_list_is_valid() {
        let xml = r#"<parameters>
  <acquisitionSystem><nChannels>2</nChannels><samplingRate>30000</samplingRate></acquisitionSystem>
  <fieldPotentials><lfpSamplingRate>1250</lfpSamplingRate></fieldPotentials>
  <spikeDetection><channelGroups></channelGroups></spikeDetection>
</parameters>"#;
        let header = parse_header_str(xml).unwrap();
        assert!(header.channel_groups.is_empty());
        assert_eq!(header.spike_waveform_sample_count, 0);
    }

    #[test]
    fn non_numeric_channel_index_is_rejected() {
        let xml = HEADER_XML.replace("<channel>5</channel>", "<channel>five</channel>");
        assert!(matches!(
            parse_header_str(&xml),
            Err(ConvertError::InvalidHeaderValue { .. })
        ));
    }
}
