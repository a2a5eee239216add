//! Electrode table assembly.
//!
//! Builds one [`ElectrodeRecord`] row per grouped channel plus a named
//! group descriptor per shank. Rows are emitted in group order and, within
//! a group, in the group's declared channel order. Downstream consumers
//! index into the table by row position rather than by channel id, so the
//! emission order is an invariant, not a convenience.

use crate::error::{ConvertError, Result};
use crate::types::{ChannelGroup, ElectrodeGroupInfo, ElectrodeRecord};

/// Optional per-channel physical metadata, indexed in electrode-row order
/// (group-then-within-group).
///
/// Each array is either fully populated for every grouped channel or
/// entirely absent, never partial. Missing physical metadata is stored
/// explicitly as NaN / "unknown" rather than silently defaulted to a
/// misleading concrete value.
#[derive(Debug, Clone, Default)]
pub struct ElectrodeAux {
    /// Electrode positions (x, y, z)
    pub positions: Option<Vec<[f64; 3]>>,
    /// Measured impedances (Ω)
    pub impedances: Option<Vec<f64>>,
    /// Anatomical locations
    pub locations: Option<Vec<String>>,
    /// Hardware filtering descriptions
    pub filtering: Option<Vec<String>>,
}

/// The assembled electrode table: ordered records plus per-shank group
/// descriptors.
#[derive(Debug, Clone)]
pub struct ElectrodeTable {
    pub records: Vec<ElectrodeRecord>,
    pub groups: Vec<ElectrodeGroupInfo>,
}

impl ElectrodeTable {
    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Builds the electrode table for the given resolved channel groups.
///
/// A present auxiliary array whose length does not match the total grouped
/// channel count fails with [`ConvertError::AuxArrayLength`].
pub fn build_electrode_table(
    groups: &[ChannelGroup],
    aux: &ElectrodeAux,
) -> Result<ElectrodeTable> {
    let total: usize = groups.iter().map(|g| g.channels.len()).sum();
    check_aux_len("positions", aux.positions.as_deref().map(|a| a.len()), total)?;
    check_aux_len("impedances", aux.impedances.as_deref().map(|a| a.len()), total)?;
    check_aux_len("locations", aux.locations.as_deref().map(|a| a.len()), total)?;
    check_aux_len("filtering", aux.filtering.as_deref().map(|a| a.len()), total)?;

    let mut records = Vec::with_capacity(total);
    let mut group_infos = Vec::with_capacity(groups.len());

    let mut row = 0;
    for group in groups {
        for (ordinal, &channel) in group.channels.iter().enumerate() {
            let [x, y, z] = aux
                .positions
                .as_ref()
                .map(|p| p[row])
                .unwrap_or([f64::NAN, f64::NAN, f64::NAN]);
            records.push(ElectrodeRecord {
                x,
                y,
                z,
                impedance: aux.impedances.as_ref().map(|i| i[row]).unwrap_or(f64::NAN),
                location: aux
                    .locations
                    .as_ref()
                    .map(|l| l[row].clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                filtering: aux
                    .filtering
                    .as_ref()
                    .map(|f| f[row].clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                group_index: group.index,
                shank_electrode_number: ordinal,
                amp_channel: channel,
            });
            row += 1;
        }

        group_infos.push(ElectrodeGroupInfo {
            name: format!("shank{}", group.index),
            description: format!(
                "electrodes of probe shank {} ({} channels)",
                group.index,
                group.channels.len()
            ),
            channel_count: group.channels.len(),
        });
    }

    Ok(ElectrodeTable {
        records,
        groups: group_infos,
    })
}

fn check_aux_len(name: &'static str, got: Option<usize>, expected: usize) -> Result<()> {
    match got {
        Some(got) if got != expected => Err(ConvertError::AuxArrayLength {
            name,
            got,
            expected,
        }),
        _ => Ok(()),
    }
}
