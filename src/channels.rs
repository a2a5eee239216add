//! Channel group resolution.
//!
//! Turns the header's nested group listing into [`ChannelGroup`] values and
//! a flattened, ascending-sorted global channel-index vector. The flat
//! vector is what multi-channel reads are subset by, so that auxiliary or
//! analog channels outside every group are excluded from probe data.

use crate::types::{ChannelGroup, SessionHeader};

/// Channel groups resolved from a session header.
#[derive(Debug, Clone)]
pub struct ResolvedChannels {
    /// Groups in header-declared order, possibly capped
    pub groups: Vec<ChannelGroup>,
    /// Ascending-sorted union of all resolved groups' channel indices
    pub flat: Vec<usize>,
}

impl ResolvedChannels {
    /// Total number of channels across the resolved groups.
    pub fn channel_count(&self) -> usize {
        self.flat.len()
    }
}

/// Resolves the header's channel groups.
///
/// `max_shanks` caps the shank population: when the header declares more
/// groups than the caller wants to process, only the first `max_shanks`
/// groups in header order are resolved. This caps, it does not sample.
///
/// Channel indices are trusted to be unique across the session; a header
/// that lists the same index in two groups is a data-integrity bug at the
/// source and is not defended against here.
pub fn resolve_channel_groups(
    header: &SessionHeader,
    max_shanks: Option<usize>,
) -> ResolvedChannels {
    let keep = match max_shanks {
        Some(n) => n.min(header.channel_groups.len()),
        None => header.channel_groups.len(),
    };

    let groups: Vec<ChannelGroup> = header.channel_groups[..keep]
        .iter()
        .enumerate()
        .map(|(index, channels)| ChannelGroup {
            index,
            channels: channels.clone(),
        })
        .collect();

    let mut flat: Vec<usize> = groups
        .iter()
        .flat_map(|g| g.channels.iter().copied())
        .collect();
    flat.sort_unstable();

    ResolvedChannels { groups, flat }
}
