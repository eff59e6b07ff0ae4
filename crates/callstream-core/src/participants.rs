#![forbid(unsafe_code)]

//! Call participants, counted per device.

use serde::{Deserialize, Serialize};

/// Devices counted per member. Larger reported counts are clamped to this.
pub const MAX_DEVICES_PER_MEMBER: usize = 64;

/// A room member taking part in the call, with the number of devices they
/// joined from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub member_id: String,
    #[serde(default = "one")]
    pub devices: usize,
}

fn one() -> usize {
    1
}

impl Participant {
    #[must_use]
    pub fn new(member_id: impl Into<String>, devices: usize) -> Self {
        Self {
            member_id: member_id.into(),
            devices,
        }
    }

    /// Device count clamped to [`MAX_DEVICES_PER_MEMBER`].
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.min(MAX_DEVICES_PER_MEMBER)
    }
}

/// Member ids repeated once per device, in participant order.
#[must_use]
pub fn participating_members(participants: &[Participant]) -> Vec<String> {
    participants
        .iter()
        .flat_map(|p| std::iter::repeat_n(p.member_id.clone(), p.device_count()))
        .collect()
}

/// Total number of devices in the call, using clamped per-member counts.
#[must_use]
pub fn participant_count(participants: &[Participant]) -> usize {
    participants
        .iter()
        .fold(0usize, |total, p| total.saturating_add(p.device_count()))
}
