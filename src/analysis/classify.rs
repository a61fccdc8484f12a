//! Per-window location classification and win counting.

use super::labels::LabelAssignment;
use super::window::DeviceWindow;
use crate::models::{round2, LocationStats, WindowResult};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Samples pooled from every device sharing one label.
#[derive(Debug, Default)]
struct LabelPool {
    sum: f64,
    count: usize,
    max: Option<f64>,
    min: Option<f64>,
    devices: Vec<String>,
}

impl LabelPool {
    fn absorb(&mut self, device: &str, cell: &DeviceWindow) {
        self.sum += cell.sum;
        self.count += cell.count;
        self.max = Some(self.max.map_or(cell.max, |m| m.max(cell.max)));
        self.min = Some(self.min.map_or(cell.min, |m| m.min(cell.min)));
        self.devices.push(device.to_string());
    }

    fn average(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Pick the closest location for one window.
///
/// Devices sharing a label are pooled over their raw samples. The label
/// with the highest average wins; equal averages go to the label that
/// sorts first. Returns `None` when no device in the window is labelled.
pub fn classify_window(
    devices: &IndexMap<String, DeviceWindow>,
    labels: &LabelAssignment,
) -> Option<WindowResult> {
    let mut pools: BTreeMap<&str, LabelPool> = BTreeMap::new();

    for (device, cell) in devices.iter() {
        let Some(label) = labels.get(device) else {
            continue;
        };
        if cell.count == 0 {
            continue;
        }
        pools.entry(label.as_str()).or_default().absorb(device, cell);
    }

    // Ascending label order plus a strict comparison keeps the smallest label on ties.
    let mut best: Option<(&str, f64)> = None;
    for (label, pool) in &pools {
        let average = pool.average();
        match best {
            Some((_, best_average)) if average <= best_average => {}
            _ => best = Some((*label, average)),
        }
    }
    let (winner, winner_average) = best?;

    let all_locations = pools
        .iter()
        .map(|(label, pool)| {
            (
                label.to_string(),
                LocationStats {
                    average_rssi: round2(pool.average()),
                    sample_count: pool.count,
                    max_rssi: pool.max.unwrap_or(f64::NAN),
                    min_rssi: pool.min.unwrap_or(f64::NAN),
                    devices: pool.devices.clone(),
                },
            )
        })
        .collect();

    Some(WindowResult {
        closest_location: winner.to_string(),
        closest_rssi: round2(winner_average),
        all_locations,
    })
}

/// Count the windows each label won.
///
/// Labels seen in some window but never winning are listed with zero;
/// labels never seen are left out.
pub fn summarize<'a, I>(results: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a WindowResult>,
{
    let mut summary = BTreeMap::new();

    for result in results {
        for label in result.all_locations.keys() {
            summary.entry(label.clone()).or_insert(0);
        }
        *summary.entry(result.closest_location.clone()).or_insert(0) += 1;
    }

    summary
}
