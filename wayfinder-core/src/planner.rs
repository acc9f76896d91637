// Multi-criteria path planning over a route graph.

use crate::error::{NavError, Result};
use crate::graph::RouteGraph;
use crate::model::{ActionType, PathPlan, RouteStep};
use crate::stealth::{CancelFlag, RiskAssessor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationStrategy {
    MinimizeRisk,
    MinimizeTime,
    MaximizeReliability,
    Balanced,
}

impl OptimizationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStrategy::MinimizeRisk => "minimize_risk",
            OptimizationStrategy::MinimizeTime => "minimize_time",
            OptimizationStrategy::MaximizeReliability => "maximize_reliability",
            OptimizationStrategy::Balanced => "balanced",
        }
    }
}

/// Planner tuning knobs. The penalty constants are empirically chosen
/// defaults; only their relative ordering is contractual.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub max_alternatives: usize,
    pub length_penalty: f64,
    pub tolerance_penalty: f64,
    pub time_penalty: f64,
    pub default_step_delay: f64,
    pub base_step_risk: f64,
    pub fast_action_penalty: f64,
    /// Per-unit-risk weight inflation used by the minimize-risk strategy.
    pub risk_inflation: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_alternatives: 3,
            length_penalty: 0.1,
            tolerance_penalty: 2.0,
            time_penalty: 0.5,
            default_step_delay: 1.0,
            base_step_risk: 0.1,
            fast_action_penalty: 0.2,
            risk_inflation: 1.5,
        }
    }
}

/// A primary plan plus the alternatives generated under other strategies.
#[derive(Debug, Clone)]
pub struct PlannedRoutes {
    pub primary: PathPlan,
    pub alternatives: Vec<PathPlan>,
}

#[derive(Clone)]
pub struct PathPlanner {
    assessor: Arc<dyn RiskAssessor>,
    config: PlannerConfig,
}

impl PathPlanner {
    pub fn new(assessor: Arc<dyn RiskAssessor>) -> Self {
        Self {
            assessor,
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn assessor(&self) -> Arc<dyn RiskAssessor> {
        self.assessor.clone()
    }

    /// Plans a path from `source` to `target`, balancing traversal weight
    /// against the caller's risk tolerance.
    ///
    /// Runs Dijkstra and A* independently, scores both candidates and keeps
    /// the better one. Deterministic for a fixed graph and arguments.
    pub fn plan(
        &self,
        graph: &RouteGraph,
        source: &str,
        target: &str,
        risk_tolerance: f64,
    ) -> Result<PathPlan> {
        self.plan_cancellable(graph, source, target, risk_tolerance, None)
    }

    /// Like `plan`, but checks the cancel flag between search phases.
    pub fn plan_cancellable(
        &self,
        graph: &RouteGraph,
        source: &str,
        target: &str,
        risk_tolerance: f64,
        cancel: Option<&CancelFlag>,
    ) -> Result<PathPlan> {
        let check = |cancel: Option<&CancelFlag>| -> Result<()> {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return Err(NavError::Cancelled);
            }
            Ok(())
        };

        check(cancel)?;
        let dijkstra = graph.shortest_path(source, target);
        check(cancel)?;
        let astar = graph.astar_path(source, target);
        check(cancel)?;

        let candidate = match (dijkstra, astar) {
            (Some(d), Some(a)) => {
                let d_score = self.path_score(d.1, d.0.len(), risk_tolerance);
                let a_score = self.path_score(a.1, a.0.len(), risk_tolerance);
                // Ties go to Dijkstra.
                if a_score > d_score { a } else { d }
            }
            (Some(d), None) => d,
            (None, Some(a)) => a,
            (None, None) => {
                return Err(NavError::NoPathFound {
                    from: source.to_string(),
                    to: target.to_string(),
                });
            }
        };

        let plan = self.build_plan(graph, &candidate.0);
        info!(
            source = %source,
            target = %target,
            steps = plan.route_sequence.len(),
            risk = plan.total_risk_score,
            "path planned"
        );
        Ok(plan)
    }

    /// Plans the primary path and up to `max_alternatives` alternatives
    /// generated under distinct optimization strategies, deduplicated by
    /// node sequence.
    pub fn plan_with_alternatives(
        &self,
        graph: &RouteGraph,
        source: &str,
        target: &str,
        risk_tolerance: f64,
    ) -> Result<PlannedRoutes> {
        let primary = self.plan(graph, source, target, risk_tolerance)?;
        let primary_nodes = plan_node_sequence(&primary);

        let strategies = [
            OptimizationStrategy::MinimizeRisk,
            OptimizationStrategy::MinimizeTime,
            OptimizationStrategy::MaximizeReliability,
            OptimizationStrategy::Balanced,
        ];

        let mut alternatives: Vec<PathPlan> = Vec::new();
        let mut seen: Vec<Vec<String>> = vec![primary_nodes];

        for strategy in strategies {
            if alternatives.len() >= self.config.max_alternatives {
                break;
            }
            let Some(nodes) = self.search_with_strategy(graph, source, target, strategy) else {
                continue;
            };
            if seen.contains(&nodes) {
                debug!(strategy = strategy.as_str(), "alternative duplicates an existing plan");
                continue;
            }
            let mut plan = self.build_plan(graph, &nodes);
            plan.metadata.insert(
                "strategy".to_string(),
                serde_json::Value::String(strategy.as_str().to_string()),
            );
            seen.push(nodes);
            alternatives.push(plan);
        }

        Ok(PlannedRoutes {
            primary,
            alternatives,
        })
    }

    /// Runs `plan` on a blocking worker under a wall-clock budget.
    pub async fn plan_with_budget(
        &self,
        graph: &RouteGraph,
        source: &str,
        target: &str,
        risk_tolerance: f64,
        budget: Duration,
    ) -> Result<PathPlan> {
        let planner = self.clone();
        let graph = graph.clone();
        let source = source.to_string();
        let target = target.to_string();

        let search = tokio::task::spawn_blocking(move || {
            planner.plan(&graph, &source, &target, risk_tolerance)
        });

        match tokio::time::timeout(budget, search).await {
            Ok(joined) => joined?,
            Err(_) => Err(NavError::PlanningTimeout {
                budget_ms: budget.as_millis() as u64,
            }),
        }
    }

    fn search_with_strategy(
        &self,
        graph: &RouteGraph,
        source: &str,
        target: &str,
        strategy: OptimizationStrategy,
    ) -> Option<Vec<String>> {
        match strategy {
            OptimizationStrategy::MinimizeRisk => {
                let inflated = self.risk_inflated_graph(graph).ok()?;
                inflated.shortest_path(source, target).map(|(nodes, _)| nodes)
            }
            OptimizationStrategy::MinimizeTime | OptimizationStrategy::Balanced => {
                graph.shortest_path(source, target).map(|(nodes, _)| nodes)
            }
            OptimizationStrategy::MaximizeReliability => {
                graph.fewest_hops_path(source, target)
            }
        }
    }

    /// Clone of the graph with each connection weight inflated in proportion
    /// to the covering route's detection risk. A flat multiplier on every
    /// edge could never change the argmin, so the inflation is risk-scaled.
    fn risk_inflated_graph(&self, graph: &RouteGraph) -> Result<RouteGraph> {
        let mut snapshot = graph.to_snapshot();
        for conn in &mut snapshot.connections {
            let risk = graph
                .route_between(&conn.source, &conn.target)
                .map(|r| r.detection_risk)
                .unwrap_or(0.5);
            conn.weight *= 1.0 + self.config.risk_inflation * risk;
        }
        RouteGraph::from_snapshot(snapshot)
    }

    /// Score used to compare the two primary search candidates; converted to
    /// higher-is-better. Penalizes long paths, tolerance violations and
    /// overall traversal time.
    fn path_score(&self, weight: f64, path_len: usize, risk_tolerance: f64) -> f64 {
        let raw = weight
            + self.config.length_penalty * path_len as f64
            + self.config.tolerance_penalty * (weight - risk_tolerance).max(0.0)
            + self.config.time_penalty * weight;
        1.0 / (1.0 + raw)
    }

    /// Converts a node sequence into an executable plan, one step per edge.
    fn build_plan(&self, graph: &RouteGraph, nodes: &[String]) -> PathPlan {
        let mut steps = Vec::with_capacity(nodes.len().saturating_sub(1));
        for (i, pair) in nodes.windows(2).enumerate() {
            let (from, to) = (&pair[0], &pair[1]);
            let route = graph.route_between(from, to);
            let route_id = route
                .map(|r| r.route_id.clone())
                .unwrap_or_else(|| format!("{}->{}", from, to));
            let action = route
                .map(|r| r.traversal_method.action())
                .unwrap_or(ActionType::Navigate);
            let delay = graph
                .weight_between(from, to)
                .unwrap_or(self.config.default_step_delay);

            let mut step = RouteStep::new(i + 1, route_id, action, to.clone(), delay);
            step.description = format!("{} to {}", action.as_str(), to);
            if let Some(route) = route {
                if let Some(first) = route.interaction_requirements.first() {
                    step.target_selector = Some(first.target_selector.clone());
                }
                if !route.interaction_requirements.is_empty() {
                    step.interaction_data =
                        serde_json::to_value(&route.interaction_requirements).ok();
                }
            }
            steps.push(step);
        }

        let source = nodes.first().cloned().unwrap_or_default();
        let target = nodes.last().cloned().unwrap_or_default();
        let mut plan = PathPlan::new(source, target, steps);
        plan.total_risk_score = self.plan_risk(&plan);
        plan
    }

    /// Mean per-step risk for a plan, in [0,1].
    pub fn plan_risk(&self, plan: &PathPlan) -> f64 {
        if plan.route_sequence.is_empty() {
            return 0.0;
        }
        let total: f64 = plan.route_sequence.iter().map(|s| self.step_risk(s)).sum();
        (total / plan.route_sequence.len() as f64).min(1.0)
    }

    /// Per-step detection risk: a base cost, an action-type surcharge, and a
    /// penalty when the step runs faster than the human timing floor for its
    /// action - too-fast is itself a risk signal.
    pub fn step_risk(&self, step: &RouteStep) -> f64 {
        let mut risk = self.config.base_step_risk + step.action_type.risk_surcharge();
        let floor = self.assessor.timing_patterns(step.action_type).min_delay;
        if step.expected_delay < floor {
            risk += self.config.fast_action_penalty;
        }
        risk.min(1.0)
    }
}

fn plan_node_sequence(plan: &PathPlan) -> Vec<String> {
    let mut nodes = vec![plan.source_context.clone()];
    nodes.extend(plan.route_sequence.iter().map(|s| s.target_url.clone()));
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stealth::HeuristicRiskAssessor;

    fn sample_graph() -> RouteGraph {
        let mut g = RouteGraph::new("shop");
        for loc in ["home", "about", "products", "cart", "checkout"] {
            g.add_location(loc);
        }
        g.add_connection("home", "about", 1.0).unwrap();
        g.add_connection("home", "products", 1.2).unwrap();
        g.add_connection("products", "cart", 1.5).unwrap();
        g.add_connection("cart", "checkout", 1.8).unwrap();
        g
    }

    fn planner() -> PathPlanner {
        PathPlanner::new(Arc::new(HeuristicRiskAssessor))
    }

    #[test]
    fn test_plan_home_to_checkout() {
        let plan = planner().plan(&sample_graph(), "home", "checkout", 0.3).unwrap();
        assert_eq!(plan.route_sequence.len(), 3);
        let targets: Vec<&str> = plan
            .route_sequence
            .iter()
            .map(|s| s.target_url.as_str())
            .collect();
        assert_eq!(targets, vec!["products", "cart", "checkout"]);
        assert!((plan.estimated_duration - 4.5).abs() < 1e-9);
        assert!(plan.total_risk_score > 0.0 && plan.total_risk_score < 0.5);
        assert!(plan.verify_invariants().is_ok());
    }

    #[test]
    fn test_plan_no_path_found() {
        let err = planner()
            .plan(&sample_graph(), "home", "nonexistent", 0.3)
            .unwrap_err();
        assert!(matches!(err, NavError::NoPathFound { .. }));
    }

    #[test]
    fn test_plan_deterministic() {
        let g = sample_graph();
        let p = planner();
        let first = p.plan(&g, "home", "checkout", 0.3).unwrap();
        for _ in 0..5 {
            let next = p.plan(&g, "home", "checkout", 0.3).unwrap();
            let a: Vec<&str> = first.route_sequence.iter().map(|s| s.target_url.as_str()).collect();
            let b: Vec<&str> = next.route_sequence.iter().map(|s| s.target_url.as_str()).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_alternatives_deduplicated() {
        // Two distinct routes to cart: direct-but-heavy and via products.
        let mut g = sample_graph();
        g.add_connection("home", "cart", 5.0).unwrap();

        let routes = planner()
            .plan_with_alternatives(&g, "home", "cart", 0.3)
            .unwrap();
        // Weighted search goes via products (2.7 < 5.0); fewest-hops goes direct.
        assert_eq!(routes.primary.route_sequence.len(), 2);
        assert!(!routes.alternatives.is_empty());
        assert!(routes.alternatives.len() <= 3);
        for alt in &routes.alternatives {
            assert_ne!(alt.plan_id, routes.primary.plan_id);
            let alt_targets: Vec<&str> =
                alt.route_sequence.iter().map(|s| s.target_url.as_str()).collect();
            let primary_targets: Vec<&str> = routes
                .primary
                .route_sequence
                .iter()
                .map(|s| s.target_url.as_str())
                .collect();
            assert_ne!(alt_targets, primary_targets);
        }
    }

    #[test]
    fn test_plan_cancelled() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = planner()
            .plan_cancellable(&sample_graph(), "home", "checkout", 0.3, Some(&cancel))
            .unwrap_err();
        assert!(matches!(err, NavError::Cancelled));
    }

    #[tokio::test]
    async fn test_plan_with_budget_succeeds() {
        let plan = planner()
            .plan_with_budget(&sample_graph(), "home", "checkout", 0.3, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(plan.route_sequence.len(), 3);
    }

    #[test]
    fn test_step_risk_too_fast_penalized() {
        let p = planner();
        let slow = RouteStep::new(1, "r", ActionType::Navigate, "u", 1.2);
        let fast = RouteStep::new(1, "r", ActionType::Navigate, "u", 0.1);
        assert!(p.step_risk(&fast) > p.step_risk(&slow));
        assert!((p.step_risk(&slow) - 0.2).abs() < 1e-9);
    }
}
