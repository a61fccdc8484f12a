//! Binding device addresses to location labels.

use crate::models::{DeviceRecords, Diagnostic};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};

/// Device address -> location label.
pub type LabelAssignment = IndexMap<String, String>;

/// Built-in location names handed out when no label is supplied.
pub const DEFAULT_LOCATION_LABELS: [&str; 8] = [
    "kitchen",
    "living_room",
    "bedroom",
    "bathroom",
    "office",
    "hallway",
    "balcony",
    "dining_room",
];

/// How labels are chosen for devices.
#[derive(Debug, Clone, Default)]
pub struct LabelPolicy {
    /// Labels matched to devices by position, in encounter order.
    pub ordered: Vec<String>,
    /// Explicit address -> label table. When non-empty it is the only
    /// source of labels and nothing is defaulted.
    pub explicit: BTreeMap<String, String>,
    /// Fallback names cycled once `ordered` runs out. Empty means the
    /// built-in list.
    pub defaults: Vec<String>,
}

impl LabelPolicy {
    /// Fallback label for the device at `position`.
    ///
    /// The first pass through the list uses the bare names; later passes
    /// append `_2`, `_3`, ... so fallbacks stay distinct.
    pub fn default_label(&self, position: usize) -> String {
        let (name, len) = if self.defaults.is_empty() {
            let len = DEFAULT_LOCATION_LABELS.len();
            (DEFAULT_LOCATION_LABELS[position % len], len)
        } else {
            let len = self.defaults.len();
            (self.defaults[position % len].as_str(), len)
        };

        match position / len {
            0 => name.to_string(),
            round => format!("{}_{}", name, round + 1),
        }
    }
}

/// Devices that carry a non-empty `channel`, in encounter order.
pub fn signal_devices(records: &DeviceRecords, channel: &str) -> Vec<String> {
    records
        .iter()
        .filter(|(_, channels)| channels.get(channel).is_some_and(|s| !s.is_empty()))
        .map(|(device, _)| device.to_string())
        .collect()
}

/// Assign a label to every device according to `policy`.
///
/// Devices left out of an explicit table stay unassigned; the analyzer
/// reports them when they turn up with data.
pub fn assign_labels(devices: &[String], policy: &LabelPolicy) -> (LabelAssignment, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    if !policy.explicit.is_empty() {
        let assignment = devices
            .iter()
            .filter_map(|device| {
                policy
                    .explicit
                    .get(device)
                    .map(|label| (device.clone(), label.clone()))
            })
            .collect();
        return (assignment, diagnostics);
    }

    if !policy.ordered.is_empty() && policy.ordered.len() != devices.len() {
        diagnostics.push(Diagnostic::LabelCountMismatch {
            provided: policy.ordered.len(),
            devices: devices.len(),
        });
    }

    // Padding never reuses a name already handed out, so two devices are
    // only pooled when the caller labels them alike.
    let mut used: HashSet<String> = policy.ordered.iter().cloned().collect();
    let mut next_default = 0usize;
    let mut assignment = LabelAssignment::new();

    for (i, device) in devices.iter().enumerate() {
        let label = match policy.ordered.get(i) {
            Some(label) => label.clone(),
            None => loop {
                let candidate = policy.default_label(next_default);
                next_default += 1;
                if used.insert(candidate.clone()) {
                    break candidate;
                }
            },
        };
        assignment.insert(device.clone(), label);
    }

    (assignment, diagnostics)
}
