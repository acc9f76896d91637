// Feedback loop: folds observed navigation events back into route weights
// and risk scores so later plans prefer routes that actually work.

use crate::error::Result;
use crate::graph::RouteGraph;
use crate::model::{EventOutcome, NavigationEvent};
use std::collections::HashMap;
use tracing::{debug, info};

/// Aggregated execution history for one route.
#[derive(Debug, Clone, Default)]
pub struct RouteStatistics {
    pub attempts: u64,
    pub successes: u64,
    pub detections: u64,
    pub total_duration_ms: u64,
}

impl RouteStatistics {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64
    }

    pub fn detection_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.detections as f64 / self.attempts as f64
    }

    /// Mean observed duration in seconds, or `None` with no samples.
    pub fn avg_duration_secs(&self) -> Option<f64> {
        if self.attempts == 0 {
            return None;
        }
        Some(self.total_duration_ms as f64 / self.attempts as f64 / 1000.0)
    }

    fn record(&mut self, event: &NavigationEvent) {
        self.attempts += 1;
        if event.outcome == EventOutcome::Success {
            self.successes += 1;
        }
        if event.outcome == EventOutcome::Detected || !event.detection_triggers.is_empty() {
            self.detections += 1;
        }
        self.total_duration_ms += event.metrics.duration_ms;
    }
}

/// Exponentially blends observed timings and failure penalties into edge
/// weights. Weights drift toward reality instead of snapping to it, so one
/// slow sample does not reroute everything.
pub struct RouteOptimizer {
    learning_rate: f64,
    /// Seconds added to the blended target per unit of failure rate.
    failure_penalty: f64,
    /// Risk added per unit of detection rate when applying adjustments.
    detection_risk_step: f64,
    stats: HashMap<String, RouteStatistics>,
}

impl Default for RouteOptimizer {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl RouteOptimizer {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate: learning_rate.clamp(0.0, 1.0),
            failure_penalty: 5.0,
            detection_risk_step: 0.2,
            stats: HashMap::new(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn stats_for(&self, route_id: &str) -> Option<&RouteStatistics> {
        self.stats.get(route_id)
    }

    pub fn tracked_routes(&self) -> usize {
        self.stats.len()
    }

    /// Folds a batch of events into the per-route aggregates.
    pub fn ingest(&mut self, events: &[NavigationEvent]) {
        for event in events {
            self.stats
                .entry(event.route_id.clone())
                .or_default()
                .record(event);
        }
        debug!(
            events = events.len(),
            routes = self.stats.len(),
            "ingested navigation events"
        );
    }

    /// Best current duration estimate for a route: the observed mean when
    /// samples exist, the supplied prior otherwise.
    pub fn timing_estimate(&self, route_id: &str, prior_secs: f64) -> f64 {
        self.stats
            .get(route_id)
            .and_then(RouteStatistics::avg_duration_secs)
            .unwrap_or(prior_secs)
    }

    /// Pushes accumulated observations into the graph: edge weights blend
    /// toward observed duration plus a failure surcharge, and routes seen
    /// triggering detection get their risk raised. Returns how many routes
    /// were adjusted.
    pub fn apply_to_graph(&self, graph: &mut RouteGraph) -> Result<usize> {
        let mut adjusted = 0;
        let route_ids: Vec<String> = graph.route_ids().collect();

        for route_id in route_ids {
            let Some(stats) = self.stats.get(&route_id) else {
                continue;
            };
            let Some(avg_secs) = stats.avg_duration_secs() else {
                continue;
            };
            let Some((source, target)) = graph.endpoints_of(&route_id) else {
                continue;
            };
            let Some(current) = graph.weight_between(&source, &target) else {
                continue;
            };

            let failure_rate = 1.0 - stats.success_rate();
            let observed = avg_secs + failure_rate * self.failure_penalty;
            let blended = current * (1.0 - self.learning_rate) + observed * self.learning_rate;
            graph.add_connection(&source, &target, blended.max(0.05))?;

            let detection_rate = stats.detection_rate();
            if detection_rate > 0.0 {
                graph.adjust_route_risk(&route_id, detection_rate * self.detection_risk_step)?;
            }
            adjusted += 1;
        }

        info!(adjusted, "applied optimizer feedback to graph");
        Ok(adjusted)
    }
}
