// kernel-broker/src/selection.rs
// ============================================================================
// Module: Selection Policy
// Description: Scores candidate runners for a model manifest and request
// context, excluding hard-filtered candidates, and ranks the rest.
// Purpose: Give the orchestrator an ordered fallback list instead of a
// single statically chosen runner.
// Dependencies: kernel-core
// ============================================================================

//! ## Overview
//! [`rank`] is a pure function: given a [`ModelManifest`], a
//! [`SelectionContext`] describing this request's preferences, and the set
//! of [`RunnerCandidate`] descriptors currently known to the caller, it
//! returns the candidates that pass the hard filters (format and device
//! compatibility) sorted by descending score, lexicographic runner
//! identifier breaking ties. Nothing here touches the network or the
//! runner factory; scoring is entirely in-memory.

use std::collections::BTreeSet;
use std::time::Duration;

use kernel_core::ModelFormat;
use kernel_core::ModelManifest;
use kernel_core::ResourceRequirements;
use kernel_core::RunnerId;

/// Request-scoped routing preferences, independent of any specific
/// candidate.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    /// Caller-specified timeout, if any; used for the latency-fit score.
    pub timeout: Option<Duration>,
    /// Caller's preferred device, e.g. `"cuda:0"`.
    pub preferred_device: Option<&'a str>,
    /// Whether the caller asked for cost-sensitive routing.
    pub cost_sensitive: bool,
}

/// What the policy knows about one candidate runner at ranking time.
///
/// # Invariants
/// - `current_load` is a fraction in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerCandidate {
    /// Candidate runner identifier.
    pub runner_id: RunnerId,
    /// Devices this runner currently exposes.
    pub devices: BTreeSet<String>,
    /// Model formats this runner can natively load.
    pub formats: BTreeSet<ModelFormat>,
    /// Most recently observed P95 inference latency, if known.
    pub observed_p95_latency: Option<Duration>,
    /// Resources currently available to this runner.
    pub available_resources: ResourceRequirements,
    /// Whether this runner's last health check reported healthy.
    pub healthy: bool,
    /// Whether this runner can serve CPU-only inference.
    pub cpu_capable: bool,
    /// Current load fraction, in `[0.0, 1.0]`.
    pub current_load: f64,
}

/// A candidate that survived the hard filters, with its computed score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    /// The candidate's runner identifier.
    pub runner_id: RunnerId,
    /// Computed score; higher ranks first.
    pub score: i32,
}

fn sufficient_resources(available: &ResourceRequirements, required: &ResourceRequirements) -> bool {
    if available.min_memory_mb < required.min_memory_mb {
        return false;
    }
    if available.min_vram_mb < required.min_vram_mb {
        return false;
    }
    if let Some(required_cores) = required.min_cores {
        if available.min_cores.is_none_or(|cores| cores < required_cores) {
            return false;
        }
    }
    if let Some(required_disk) = required.min_disk_mb {
        if available.min_disk_mb.is_none_or(|disk| disk < required_disk) {
            return false;
        }
    }
    true
}

fn load_adjust(current_load: f64) -> i32 {
    if current_load < 0.7 {
        10
    } else if current_load > 0.9 {
        -20
    } else {
        0
    }
}

/// Scores one candidate against `manifest`/`context`, returning `None` when
/// the candidate fails a hard filter (no shared format, no shared device).
#[must_use]
pub fn score(manifest: &ModelManifest, context: &SelectionContext<'_>, candidate: &RunnerCandidate) -> Option<i32> {
    let shares_format = manifest.artifacts.keys().any(|format| candidate.formats.contains(format));
    if !shares_format {
        return None;
    }
    let shares_device = manifest
        .supported_devices
        .iter()
        .any(|device| candidate.devices.contains(device));
    if !shares_device {
        return None;
    }

    let mut total = 0;
    if context
        .preferred_device
        .is_some_and(|preferred| candidate.devices.contains(preferred))
    {
        total += 50;
    }
    total += 30; // shares_format already guaranteed above.
    if let Some(timeout) = context.timeout {
        if candidate.observed_p95_latency.is_some_and(|p95| p95 < timeout) {
            total += 25;
        }
    }
    if sufficient_resources(&candidate.available_resources, &manifest.resources) {
        total += 20;
    }
    if candidate.healthy {
        total += 15;
    }
    if context.cost_sensitive && candidate.cpu_capable {
        total += 10;
    }
    total += load_adjust(candidate.current_load);
    Some(total)
}

/// Ranks `candidates` against `manifest`/`context`, dropping hard-filtered
/// candidates and sorting the rest by descending score, then ascending
/// runner identifier.
#[must_use]
pub fn rank(manifest: &ModelManifest, context: &SelectionContext<'_>, candidates: &[RunnerCandidate]) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .filter_map(|candidate| {
            score(manifest, context, candidate).map(|score| RankedCandidate {
                runner_id: candidate.runner_id.clone(),
                score,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.runner_id.as_str().cmp(b.runner_id.as_str())));
    ranked
}
