//! Resolution of logical metrics from raw sensor readings.
//!
//! A machine exposes many competing readings for what the user thinks of as
//! one value ("the CPU temperature"). The resolver refreshes the relevant
//! subtree, drops readings without a value, filters noise through the
//! [`PlausibilityPolicy`] and ranks the rest by how well their names match a
//! metric's preferred keywords.

mod metric;
mod plausibility;

pub use metric::{LogicalMetric, MetricSpec, MetricUnit, Selection};
pub use plausibility::PlausibilityPolicy;

use std::cmp::Ordering;

use crate::device::{
    AdapterError, DeviceTree, NodePath, SensorKind, collect_readings, node_at, refresh_subtree,
    roots_of_kind,
};

/// Errors raised while resolving a metric.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{metric}: {source}")]
    Adapter {
        metric: LogicalMetric,
        #[source]
        source: AdapterError,
    },
}

/// A reading that carries a value.
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    name: &'a str,
    value: f32,
}

/// Keyword score of a reading name: 2 per keyword contained in `name`,
/// compared case-insensitively.
pub fn score_name(name: &str, keywords: &[&str]) -> u32 {
    if name.trim().is_empty() {
        return 0;
    }
    let lower = name.to_lowercase();
    keywords
        .iter()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .count() as u32
        * 2
}

/// Resolves `metric` against `tree`.
///
/// Returns `Ok(None)` when no matching device or reading exists. Every node
/// that is read is refreshed first, together with all of its sub-nodes.
pub fn resolve(
    tree: &mut dyn DeviceTree,
    metric: LogicalMetric,
    policy: &PlausibilityPolicy,
) -> Result<Option<f32>, ResolveError> {
    let spec = metric.spec();
    let adapter_err = |source| ResolveError::Adapter { metric, source };

    if spec.selection == Selection::AggregateMax {
        let paths = roots_of_kind(tree.roots(), spec.hardware);
        let mut best: Option<f32> = None;
        for path in paths {
            refresh_subtree(tree, &path).map_err(adapter_err)?;
            let candidates = candidates_at(tree, &path, spec.sensor).map_err(adapter_err)?;
            // Nodes with only implausible readings are skipped, not substituted.
            let node_max = hottest(plausible(&candidates, spec.sensor, policy));
            best = max_option(best, node_max);
        }
        return Ok(best);
    }

    let Some(path) = roots_of_kind(tree.roots(), spec.hardware).into_iter().next() else {
        return Ok(None);
    };
    refresh_subtree(tree, &path).map_err(adapter_err)?;
    let candidates = candidates_at(tree, &path, spec.sensor).map_err(adapter_err)?;

    let value = match spec.selection {
        Selection::Ranked { keywords } => {
            let mut pool = plausible(&candidates, spec.sensor, policy);
            if pool.is_empty() {
                pool = candidates.clone();
            }
            rank(pool, keywords)
        }
        Selection::Hottest => hottest(plausible(&candidates, spec.sensor, policy)),
        Selection::FirstMatch { label } => {
            let label = label.to_lowercase();
            candidates
                .iter()
                .find(|c| c.name.to_lowercase().contains(&label))
                .map(|c| c.value)
        }
        Selection::AggregateMax => None,
    };
    Ok(value)
}

/// Readings of `sensor` under the node at `path` that carry a value.
fn candidates_at<'a>(
    tree: &'a dyn DeviceTree,
    path: &NodePath,
    sensor: SensorKind,
) -> Result<Vec<Candidate<'a>>, AdapterError> {
    let node = node_at(tree.roots(), path).ok_or_else(|| AdapterError::NodeGone(path.clone()))?;
    Ok(collect_readings(node, sensor)
        .into_iter()
        .filter_map(|r| {
            r.numeric().map(|value| Candidate {
                name: r.name.as_str(),
                value,
            })
        })
        .collect())
}

fn plausible<'a>(
    candidates: &[Candidate<'a>],
    sensor: SensorKind,
    policy: &PlausibilityPolicy,
) -> Vec<Candidate<'a>> {
    candidates
        .iter()
        .filter(|c| policy.is_plausible(sensor, c.value))
        .copied()
        .collect()
}

/// Highest keyword score wins; ties go to the higher value.
fn rank(pool: Vec<Candidate<'_>>, keywords: &[&str]) -> Option<f32> {
    pool.into_iter()
        .map(|c| (score_name(c.name, keywords), c.value))
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)))
        .map(|(_, value)| value)
}

fn hottest(pool: Vec<Candidate<'_>>) -> Option<f32> {
    pool.into_iter().map(|c| c.value).max_by(f32::total_cmp)
}

fn max_option(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(match a.total_cmp(&b) {
            Ordering::Less => b,
            _ => a,
        }),
        (a, None) => a,
        (None, b) => b,
    }
}
