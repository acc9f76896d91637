// Run-time adaptation: obstacle classification, strategy selection and
// recovery-plan construction for plans under execution.

use crate::error::{NavError, Result};
use crate::graph::RouteGraph;
use crate::model::{ActionType, EventOutcome, NavigationEvent, PathPlan, RouteStep};
use crate::planner::PathPlanner;
use crate::stealth::RiskAssessor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleKind {
    Timeout,
    Blocked,
    NotFound,
    NetworkError,
    JsError,
    ElementNotFound,
    ConnectionError,
    SslError,
    Unknown,
}

impl ObstacleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObstacleKind::Timeout => "timeout",
            ObstacleKind::Blocked => "blocked",
            ObstacleKind::NotFound => "not_found",
            ObstacleKind::NetworkError => "network_error",
            ObstacleKind::JsError => "js_error",
            ObstacleKind::ElementNotFound => "element_not_found",
            ObstacleKind::ConnectionError => "connection_error",
            ObstacleKind::SslError => "ssl_error",
            ObstacleKind::Unknown => "unknown",
        }
    }

    /// Severity of the obstacle type, in [0,1].
    pub fn severity(&self) -> f64 {
        match self {
            ObstacleKind::Timeout => 0.7,
            ObstacleKind::Blocked => 0.8,
            ObstacleKind::NotFound => 0.6,
            ObstacleKind::NetworkError => 0.5,
            ObstacleKind::JsError => 0.4,
            ObstacleKind::ElementNotFound => 0.3,
            ObstacleKind::ConnectionError => 0.6,
            ObstacleKind::SslError => 0.5,
            ObstacleKind::Unknown => 0.5,
        }
    }

    pub fn from_code(code: &str) -> Self {
        let code = code.to_lowercase();
        if code.contains("timeout") {
            ObstacleKind::Timeout
        } else if code.contains("block") || code.contains("403") {
            ObstacleKind::Blocked
        } else if code.contains("element") {
            ObstacleKind::ElementNotFound
        } else if code.contains("404") || code.contains("not_found") {
            ObstacleKind::NotFound
        } else if code.contains("connection") {
            ObstacleKind::ConnectionError
        } else if code.contains("ssl") || code.contains("tls") {
            ObstacleKind::SslError
        } else if code.contains("network") || code.contains("dns") {
            ObstacleKind::NetworkError
        } else if code.contains("js") || code.contains("script") {
            ObstacleKind::JsError
        } else {
            ObstacleKind::Unknown
        }
    }

    /// Obstacles that warrant routing around the failed node entirely.
    pub fn is_avoidable(&self) -> bool {
        matches!(
            self,
            ObstacleKind::Blocked | ObstacleKind::NotFound | ObstacleKind::ConnectionError
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub severity: f64,
}

/// The five adaptation strategies. Declaration order doubles as the
/// tie-break order during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationStrategy {
    RetryWithDelay,
    AlternativePath,
    StealthEnhancement,
    ObstacleAvoidance,
    GracefulDegradation,
}

impl AdaptationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdaptationStrategy::RetryWithDelay => "retry_with_delay",
            AdaptationStrategy::AlternativePath => "alternative_path",
            AdaptationStrategy::StealthEnhancement => "stealth_enhancement",
            AdaptationStrategy::ObstacleAvoidance => "obstacle_avoidance",
            AdaptationStrategy::GracefulDegradation => "graceful_degradation",
        }
    }

    const ALL: [AdaptationStrategy; 5] = [
        AdaptationStrategy::RetryWithDelay,
        AdaptationStrategy::AlternativePath,
        AdaptationStrategy::StealthEnhancement,
        AdaptationStrategy::ObstacleAvoidance,
        AdaptationStrategy::GracefulDegradation,
    ];
}

/// Configurable priors per strategy. The contextual multipliers applied on
/// top are empirically chosen; tests assert winner identity, not scores.
#[derive(Debug, Clone)]
pub struct StrategyWeights {
    pub retry_with_delay: f64,
    pub alternative_path: f64,
    pub stealth_enhancement: f64,
    pub obstacle_avoidance: f64,
    pub graceful_degradation: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            retry_with_delay: 1.0,
            alternative_path: 1.0,
            stealth_enhancement: 1.0,
            obstacle_avoidance: 1.0,
            graceful_degradation: 0.8,
        }
    }
}

/// Exponential backoff policy for in-place retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// What the caller should do with the plan after adaptation.
#[derive(Debug, Clone)]
pub enum AdaptationOutcome {
    /// Re-execute the current step after waiting. Same plan id; the cursor
    /// stays on the failed step.
    Retry { delay: Duration, attempt: u32 },
    /// Switch to a freshly built plan chained to the old one via
    /// `fallback_plans`.
    Replaced {
        plan: PathPlan,
        strategy: AdaptationStrategy,
    },
}

pub struct AdaptationEngine {
    planner: PathPlanner,
    assessor: Arc<dyn RiskAssessor>,
    weights: StrategyWeights,
    retry: RetryPolicy,
    /// Stealth score above which a detection event triggers a full recovery
    /// plan instead of plain enhancement.
    recovery_threshold: f64,
    /// Multiplied into per-step risk after enhancement.
    stealth_discount: f64,
}

impl AdaptationEngine {
    pub fn new(planner: PathPlanner, assessor: Arc<dyn RiskAssessor>) -> Self {
        Self {
            planner,
            assessor,
            weights: StrategyWeights::default(),
            retry: RetryPolicy::default(),
            recovery_threshold: 0.7,
            stealth_discount: 0.85,
        }
    }

    pub fn with_weights(mut self, weights: StrategyWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_recovery_threshold(mut self, threshold: f64) -> Self {
        self.recovery_threshold = threshold;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn recovery_threshold(&self) -> f64 {
        self.recovery_threshold
    }

    /// Maps a non-success event to an obstacle with a severity score.
    pub fn classify(&self, event: &NavigationEvent) -> Obstacle {
        let kind = match (&event.error_code, event.outcome) {
            (Some(code), _) => ObstacleKind::from_code(code),
            (None, EventOutcome::Timeout) => ObstacleKind::Timeout,
            (None, EventOutcome::Detected) => ObstacleKind::Blocked,
            _ => ObstacleKind::Unknown,
        };
        Obstacle {
            kind,
            severity: kind.severity(),
        }
    }

    /// Scores all five strategies against the obstacle and the plan's
    /// progress/residual risk, returning the winner. Retry is excluded once
    /// `max_attempts` is reached so a failing step always escalates.
    pub fn select_strategy(
        &self,
        plan: &PathPlan,
        obstacle: &Obstacle,
        retry_count: u32,
    ) -> AdaptationStrategy {
        self.ranked_strategies(plan, obstacle, retry_count)[0].0
    }

    fn ranked_strategies(
        &self,
        plan: &PathPlan,
        obstacle: &Obstacle,
        retry_count: u32,
    ) -> Vec<(AdaptationStrategy, f64)> {
        let progress = plan.progress();
        let residual_risk = plan.total_risk_score;
        let severity = obstacle.severity;

        let mut scored: Vec<(AdaptationStrategy, f64)> = AdaptationStrategy::ALL
            .iter()
            .map(|&strategy| {
                let (prior, bonus) = match strategy {
                    AdaptationStrategy::RetryWithDelay => {
                        let bonus = if retry_count >= self.retry.max_attempts {
                            0.0
                        } else if severity > 0.6 {
                            0.3
                        } else if severity < 0.5 && progress < 0.3 {
                            1.4
                        } else {
                            1.0
                        };
                        (self.weights.retry_with_delay, bonus)
                    }
                    AdaptationStrategy::AlternativePath => {
                        let bonus = if severity > 0.6 || progress > 0.7 || residual_risk > 0.7 {
                            1.5
                        } else {
                            0.8
                        };
                        (self.weights.alternative_path, bonus)
                    }
                    AdaptationStrategy::StealthEnhancement => {
                        let bonus = if residual_risk > 0.6 { 1.3 } else { 0.9 };
                        (self.weights.stealth_enhancement, bonus)
                    }
                    AdaptationStrategy::ObstacleAvoidance => {
                        let bonus = if obstacle.kind.is_avoidable() { 1.2 } else { 0.6 };
                        (self.weights.obstacle_avoidance, bonus)
                    }
                    AdaptationStrategy::GracefulDegradation => {
                        let bonus = if severity > 0.8 || progress > 0.9 { 1.1 } else { 0.5 };
                        (self.weights.graceful_degradation, bonus)
                    }
                };
                (strategy, prior * bonus)
            })
            .collect();

        // Stable sort keeps declaration order on ties.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Reacts to a failed step: classifies the obstacle, picks a strategy
    /// and applies it. Strategies that turn out inapplicable (no alternative
    /// path, nothing left to enhance) fall through to the next-ranked one;
    /// if every strategy fails the error is terminal for this plan.
    pub fn adapt(
        &self,
        graph: &RouteGraph,
        plan: &PathPlan,
        event: &NavigationEvent,
        retry_count: u32,
        risk_tolerance: f64,
    ) -> Result<AdaptationOutcome> {
        let obstacle = self.classify(event);
        info!(
            plan_id = %plan.plan_id,
            obstacle = obstacle.kind.as_str(),
            severity = obstacle.severity,
            progress = plan.progress(),
            "adapting to obstacle"
        );

        for (strategy, score) in self.ranked_strategies(plan, &obstacle, retry_count) {
            if score <= 0.0 {
                continue;
            }
            debug!(strategy = strategy.as_str(), score, "trying strategy");
            match self.apply(strategy, graph, plan, &obstacle, retry_count, risk_tolerance) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    warn!(strategy = strategy.as_str(), %err, "strategy not applicable");
                }
            }
        }

        Err(NavError::AdaptationFailed(format!(
            "no viable strategy for {} on plan '{}'",
            obstacle.kind.as_str(),
            plan.plan_id
        )))
    }

    fn apply(
        &self,
        strategy: AdaptationStrategy,
        graph: &RouteGraph,
        plan: &PathPlan,
        obstacle: &Obstacle,
        retry_count: u32,
        risk_tolerance: f64,
    ) -> Result<AdaptationOutcome> {
        match strategy {
            AdaptationStrategy::RetryWithDelay => {
                if retry_count >= self.retry.max_attempts {
                    return Err(NavError::AdaptationFailed(
                        "retry attempts exhausted".to_string(),
                    ));
                }
                Ok(AdaptationOutcome::Retry {
                    delay: self.retry.delay_for(retry_count),
                    attempt: retry_count + 1,
                })
            }
            AdaptationStrategy::AlternativePath => {
                let plan_graph;
                let search_graph = if obstacle.kind.is_avoidable() {
                    plan_graph = self.without_failed_node(graph, plan)?;
                    &plan_graph
                } else {
                    graph
                };
                self.replan(search_graph, plan, risk_tolerance, strategy)
            }
            AdaptationStrategy::StealthEnhancement => {
                let enhanced = self.enhance_plan(plan)?;
                Ok(AdaptationOutcome::Replaced {
                    plan: enhanced,
                    strategy,
                })
            }
            AdaptationStrategy::ObstacleAvoidance => {
                let pruned = self.without_failed_node(graph, plan)?;
                self.replan(&pruned, plan, risk_tolerance, strategy)
            }
            AdaptationStrategy::GracefulDegradation => Ok(AdaptationOutcome::Replaced {
                plan: self.degrade(plan, obstacle),
                strategy,
            }),
        }
    }

    /// Clone of the graph with the failed step's destination pruned. The
    /// shared graph is never mutated; the clone lives only for the re-search.
    fn without_failed_node(&self, graph: &RouteGraph, plan: &PathPlan) -> Result<RouteGraph> {
        let failed = plan
            .route_sequence
            .get(plan.current_step)
            .ok_or_else(|| NavError::AdaptationFailed("no failing step".to_string()))?;
        if failed.target_url == plan.target_destination {
            return Err(NavError::AdaptationFailed(
                "cannot prune the target destination".to_string(),
            ));
        }
        let mut pruned = graph.clone();
        pruned.remove_location(&failed.target_url)?;
        Ok(pruned)
    }

    fn replan(
        &self,
        graph: &RouteGraph,
        plan: &PathPlan,
        risk_tolerance: f64,
        strategy: AdaptationStrategy,
    ) -> Result<AdaptationOutcome> {
        let mut replacement = self.planner.plan(
            graph,
            plan.current_location(),
            &plan.target_destination,
            risk_tolerance,
        )?;
        replacement.fallback_plans = vec![plan.plan_id.clone()];
        replacement.metadata.insert(
            "adaptation_strategy".to_string(),
            serde_json::Value::String(strategy.as_str().to_string()),
        );
        info!(
            old_plan = %plan.plan_id,
            new_plan = %replacement.plan_id,
            strategy = strategy.as_str(),
            "plan replaced"
        );
        Ok(AdaptationOutcome::Replaced {
            plan: replacement,
            strategy,
        })
    }

    /// Clones the remaining steps with delays resampled from the human
    /// timing distribution and recomputes risk. Enhancement must strictly
    /// reduce the plan's risk score.
    pub fn enhance_plan(&self, plan: &PathPlan) -> Result<PathPlan> {
        let remaining = plan.remaining_steps();
        if remaining.is_empty() {
            return Err(NavError::AdaptationFailed(
                "no steps remain to enhance".to_string(),
            ));
        }

        let steps: Vec<RouteStep> = remaining
            .iter()
            .map(|step| {
                let mut step = step.clone();
                let pattern = self.assessor.timing_patterns(step.action_type);
                step.expected_delay = step.expected_delay.max(pattern.humanized_delay());
                step.metadata
                    .insert("stealth_enhanced".to_string(), serde_json::Value::Bool(true));
                step
            })
            .collect();

        let mut enhanced = PathPlan::new(
            plan.current_location().to_string(),
            plan.target_destination.clone(),
            steps,
        );
        enhanced.fallback_plans = vec![plan.plan_id.clone()];
        enhanced
            .metadata
            .insert("stealth_enhanced".to_string(), serde_json::Value::Bool(true));

        // The recomputed mean covers only the remaining steps, which may sit
        // above the whole-plan mean; cap against the discounted original so
        // enhancement always nets a risk decrease.
        let recomputed = self.planner.plan_risk(&enhanced) * self.stealth_discount;
        enhanced.total_risk_score =
            recomputed.min(plan.total_risk_score * self.stealth_discount);
        Ok(enhanced)
    }

    /// Collapses the plan to a single fallback step: the next remaining step
    /// at double its delay, or a synthetic 5s navigation when nothing is
    /// left.
    fn degrade(&self, plan: &PathPlan, obstacle: &Obstacle) -> PathPlan {
        let step = match plan.remaining_steps().first() {
            Some(first) => {
                let mut step = first.clone();
                step.expected_delay *= 2.0;
                step.description = format!("degraded: {}", step.description);
                step
            }
            None => {
                let mut step = RouteStep::new(
                    1,
                    "fallback",
                    ActionType::Navigate,
                    plan.target_destination.clone(),
                    5.0,
                );
                step.description = "synthetic fallback step".to_string();
                step
            }
        };

        let mut degraded = PathPlan::new(
            plan.current_location().to_string(),
            plan.target_destination.clone(),
            vec![step],
        );
        degraded.fallback_plans = vec![plan.plan_id.clone()];
        degraded.degradation_reason = Some(obstacle.kind.as_str().to_string());
        degraded.total_risk_score = self.planner.plan_risk(&degraded);
        warn!(
            old_plan = %plan.plan_id,
            new_plan = %degraded.plan_id,
            reason = obstacle.kind.as_str(),
            "plan degraded to single fallback step"
        );
        degraded
    }

    /// Handles a detection trigger. Above the recovery threshold the whole
    /// remainder of the plan is rebuilt as a stealth-enhanced recovery plan
    /// tagged with the triggering event; below it, plain enhancement.
    pub fn handle_detection(
        &self,
        plan: &PathPlan,
        event: &NavigationEvent,
    ) -> Result<AdaptationOutcome> {
        let mut recovery = self.enhance_plan(plan).map_err(|err| {
            NavError::DetectionRecoveryFailed(format!(
                "plan '{}': {}",
                plan.plan_id, err
            ))
        })?;

        if event.stealth_score_after > self.recovery_threshold {
            recovery.metadata.insert(
                "detection_event_id".to_string(),
                serde_json::Value::String(event.event_id.clone()),
            );
            info!(
                plan_id = %plan.plan_id,
                recovery_plan = %recovery.plan_id,
                stealth_score = event.stealth_score_after,
                "detection recovery plan built"
            );
        }

        Ok(AdaptationOutcome::Replaced {
            plan: recovery,
            strategy: AdaptationStrategy::StealthEnhancement,
        })
    }
}
