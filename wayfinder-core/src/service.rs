// Orchestration: plans a route, walks it step by step through the executor,
// reacts to failures through the adaptation engine and feeds results back
// into the optimizer and history store.

use crate::adapt::{AdaptationEngine, AdaptationOutcome};
use crate::error::{NavError, Result};
use crate::graph::RouteGraph;
use crate::history::HistoryStore;
use crate::model::{EventOutcome, NavigationEvent, PathPlan, PlanStatus};
use crate::optimize::RouteOptimizer;
use crate::planner::PathPlanner;
use crate::session::{ContextStore, NavigationContext};
use crate::stealth::{CancelFlag, RiskAssessor, StepExecutor, StepOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Sessions allowed to run at once; further callers wait on a permit.
    pub max_concurrent_sessions: usize,
    pub risk_tolerance: f64,
    /// Sleep each step's expected delay before executing it. Off in
    /// simulations and tests.
    pub pace_steps: bool,
    /// Hard bound on plan replacements per session.
    pub max_adaptations: u32,
    /// Apply optimizer feedback to the graph after each session.
    pub learn: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 3,
            risk_tolerance: 0.5,
            pace_steps: true,
            max_adaptations: 10,
            learn: true,
        }
    }
}

/// Summary of one navigation session.
#[derive(Debug, Clone)]
pub struct NavigationReport {
    pub session_id: String,
    pub plan_id: String,
    pub source: String,
    pub target: String,
    pub status: PlanStatus,
    pub steps_executed: u64,
    pub adaptations: u32,
    pub retries: u32,
    pub events: Vec<NavigationEvent>,
}

impl NavigationReport {
    pub fn completed(&self) -> bool {
        self.status == PlanStatus::Completed
    }
}

pub struct NavigationService {
    graph: RwLock<RouteGraph>,
    planner: PathPlanner,
    engine: AdaptationEngine,
    executor: Arc<dyn StepExecutor>,
    optimizer: Mutex<RouteOptimizer>,
    contexts: Mutex<ContextStore>,
    history: Option<Mutex<HistoryStore>>,
    /// Completed and superseded plans, keyed by plan id. Fallback chains
    /// reference entries here by id.
    plans: Mutex<HashMap<String, PathPlan>>,
    permits: Arc<Semaphore>,
    config: ServiceConfig,
}

impl NavigationService {
    pub fn new(
        graph: RouteGraph,
        assessor: Arc<dyn RiskAssessor>,
        executor: Arc<dyn StepExecutor>,
        config: ServiceConfig,
    ) -> Self {
        let planner = PathPlanner::new(assessor.clone());
        let engine = AdaptationEngine::new(planner.clone(), assessor);
        Self {
            graph: RwLock::new(graph),
            planner,
            engine,
            executor,
            optimizer: Mutex::new(RouteOptimizer::default()),
            contexts: Mutex::new(ContextStore::new()),
            history: None,
            plans: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_sessions.max(1))),
            config,
        }
    }

    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(Mutex::new(history));
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub async fn graph_snapshot(&self) -> crate::graph::GraphSnapshot {
        self.graph.read().await.to_snapshot()
    }

    pub async fn plan_by_id(&self, plan_id: &str) -> Option<PathPlan> {
        self.plans.lock().await.get(plan_id).cloned()
    }

    /// Builds a plan without executing it.
    pub async fn plan(&self, source: &str, target: &str) -> Result<PathPlan> {
        let graph = self.graph.read().await;
        self.planner
            .plan(&graph, source, target, self.config.risk_tolerance)
    }

    pub async fn navigate(&self, source: &str, target: &str) -> Result<NavigationReport> {
        self.navigate_with_cancel(source, target, CancelFlag::new())
            .await
    }

    /// Plans and walks a route from `source` to `target`. The cancel flag is
    /// checked before every step; a cancelled session records as such and
    /// returns `NavError::Cancelled`.
    pub async fn navigate_with_cancel(
        &self,
        source: &str,
        target: &str,
        cancel: CancelFlag,
    ) -> Result<NavigationReport> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| NavError::Cancelled)?;

        let mut plan = {
            let graph = self.graph.read().await;
            self.planner
                .plan(&graph, source, target, self.config.risk_tolerance)?
        };
        let initial_plan_id = plan.plan_id.clone();
        plan.status = PlanStatus::Executing;

        let mut ctx = NavigationContext::new(source);
        let session_id = ctx.session_id.clone();
        info!(
            session_id = %session_id,
            plan_id = %plan.plan_id,
            source,
            target,
            steps = plan.route_sequence.len(),
            "navigation session started"
        );

        if let Some(history) = &self.history {
            let graph_id = self.graph.read().await.graph_id().to_string();
            history
                .lock()
                .await
                .create_session(&session_id, &graph_id, source, target, &plan.plan_id)?;
        }

        let mut events: Vec<NavigationEvent> = Vec::new();
        let mut stealth_score = 0.1;
        let mut retry_count: u32 = 0;
        let mut total_retries: u32 = 0;
        let mut adaptations: u32 = 0;

        let result = loop {
            if cancel.is_cancelled() {
                plan.status = PlanStatus::Cancelled;
                break Err(NavError::Cancelled);
            }
            if plan.is_complete() {
                plan.status = PlanStatus::Completed;
                break Ok(());
            }

            let step = plan.route_sequence[plan.current_step].clone();
            if self.config.pace_steps && step.expected_delay > 0.0 {
                if let Err(err) =
                    sleep_cancellable(Duration::from_secs_f64(step.expected_delay), &cancel).await
                {
                    plan.status = PlanStatus::Cancelled;
                    break Err(err);
                }
            }

            let outcome = self.executor.execute(&step, &ctx).await;
            let event = build_event(&step.route_id, &ctx, &step.target_url, &outcome, stealth_score)?;
            stealth_score = event.stealth_score_after;
            ctx.record_event(&event.event_id, &step.target_url, outcome.success);
            if let Some(history) = &self.history {
                history.lock().await.insert_event(&session_id, &event)?;
            }
            events.push(event.clone());

            if outcome.success {
                plan.advance();
                retry_count = 0;
            }

            // Detection handling runs even on nominally successful steps.
            if (event.outcome == EventOutcome::Detected || !event.detection_triggers.is_empty())
                && !plan.is_complete()
            {
                match self.engine.handle_detection(&plan, &event) {
                    Ok(AdaptationOutcome::Replaced { plan: recovery, .. }) => {
                        adaptations += 1;
                        plan = self.swap_plan(plan, recovery).await;
                        retry_count = 0;
                        continue;
                    }
                    Ok(AdaptationOutcome::Retry { .. }) => {}
                    Err(err) => {
                        warn!(session_id = %session_id, %err, "detection recovery failed");
                        plan.status = PlanStatus::Failed;
                        break Err(err);
                    }
                }
            }

            if outcome.success {
                continue;
            }

            if adaptations >= self.config.max_adaptations {
                plan.status = PlanStatus::Failed;
                break Err(NavError::AdaptationFailed(format!(
                    "adaptation budget of {} exhausted",
                    self.config.max_adaptations
                )));
            }

            let graph = self.graph.read().await;
            match self
                .engine
                .adapt(&graph, &plan, &event, retry_count, self.config.risk_tolerance)
            {
                Ok(AdaptationOutcome::Retry { delay, attempt }) => {
                    drop(graph);
                    debug!(session_id = %session_id, attempt, ?delay, "retrying step");
                    if self.config.pace_steps {
                        if let Err(err) = sleep_cancellable(delay, &cancel).await {
                            plan.status = PlanStatus::Cancelled;
                            break Err(err);
                        }
                    }
                    retry_count = attempt;
                    total_retries += 1;
                }
                Ok(AdaptationOutcome::Replaced {
                    plan: replacement,
                    strategy,
                }) => {
                    drop(graph);
                    debug!(
                        session_id = %session_id,
                        strategy = strategy.as_str(),
                        "plan replaced mid-session"
                    );
                    adaptations += 1;
                    plan = self.swap_plan(plan, replacement).await;
                    retry_count = 0;
                }
                Err(err) => {
                    plan.status = PlanStatus::Failed;
                    break Err(err);
                }
            }
        };

        let final_plan_id = plan.plan_id.clone();
        let status = plan.status;
        self.plans.lock().await.insert(final_plan_id.clone(), plan);

        if let Some(history) = &self.history {
            let history = history.lock().await;
            match status {
                PlanStatus::Completed => history.complete_session(&session_id, adaptations)?,
                PlanStatus::Cancelled => history.cancel_session(&session_id, adaptations)?,
                _ => history.fail_session(&session_id, adaptations)?,
            }
        }

        {
            let mut optimizer = self.optimizer.lock().await;
            optimizer.ingest(&events);
            if self.config.learn {
                let mut graph = self.graph.write().await;
                optimizer.apply_to_graph(&mut graph)?;
            }
        }

        let steps_executed = ctx.steps_executed;
        self.contexts.lock().await.insert(ctx);

        let report = NavigationReport {
            session_id,
            plan_id: final_plan_id,
            source: source.to_string(),
            target: target.to_string(),
            status,
            steps_executed,
            adaptations,
            retries: total_retries,
            events,
        };
        info!(
            session_id = %report.session_id,
            status = report.status.as_str(),
            steps = report.steps_executed,
            adaptations = report.adaptations,
            "navigation session finished"
        );

        if let Err(err) = &result {
            warn!(plan_id = %initial_plan_id, %err, "session did not complete");
        }
        result.map(|_| report)
    }

    /// Runs the plan against the current graph without pacing, reporting
    /// what would happen. Uses the configured executor.
    pub async fn simulate(&self, source: &str, target: &str) -> Result<NavigationReport> {
        let report = NavigationService {
            graph: RwLock::new(self.graph.read().await.clone()),
            planner: self.planner.clone(),
            engine: AdaptationEngine::new(self.planner.clone(), self.planner.assessor()),
            executor: self.executor.clone(),
            optimizer: Mutex::new(RouteOptimizer::default()),
            contexts: Mutex::new(ContextStore::new()),
            history: None,
            plans: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(1)),
            config: ServiceConfig {
                pace_steps: false,
                learn: false,
                ..self.config.clone()
            },
        }
        .navigate(source, target)
        .await?;
        Ok(report)
    }

    /// Evicts navigation contexts idle longer than `max_idle`.
    pub async fn cleanup_sessions(&self, max_idle: chrono::Duration) -> usize {
        self.contexts.lock().await.cleanup_expired(max_idle)
    }

    async fn swap_plan(&self, old: PathPlan, mut replacement: PathPlan) -> PathPlan {
        let mut plans = self.plans.lock().await;
        let mut old = old;
        old.status = PlanStatus::Adapting;
        plans.insert(old.plan_id.clone(), old);
        replacement.status = PlanStatus::Executing;
        replacement
    }
}

/// Sleeps in short slices so a cancellation is observed mid-wait instead of
/// only after the full pacing or backoff delay elapses.
async fn sleep_cancellable(duration: Duration, cancel: &CancelFlag) -> Result<()> {
    const SLICE: Duration = Duration::from_millis(25);
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return Err(NavError::Cancelled);
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Ok(());
        }
        tokio::time::sleep((deadline - now).min(SLICE)).await;
    }
}

fn build_event(
    route_id: &str,
    ctx: &NavigationContext,
    destination: &str,
    outcome: &StepOutcome,
    stealth_before: f64,
) -> Result<NavigationEvent> {
    let kind = if outcome.success {
        if outcome.detection_triggers.is_empty() {
            EventOutcome::Success
        } else {
            EventOutcome::Detected
        }
    } else if !outcome.detection_triggers.is_empty() {
        EventOutcome::Detected
    } else if outcome
        .error_code
        .as_deref()
        .is_some_and(|c| c.contains("timeout"))
    {
        EventOutcome::Timeout
    } else {
        EventOutcome::Failure
    };

    let context_after = if outcome.success {
        destination
    } else {
        ctx.current_page.as_str()
    };

    let mut event = NavigationEvent::new(
        route_id,
        ctx.current_page.clone(),
        context_after,
        kind,
        stealth_before.clamp(0.0, 1.0),
        outcome.stealth_score.clamp(0.0, 1.0),
    )?;
    event.metrics = outcome.metrics.clone();
    event.error_code = outcome.error_code.clone();
    event.error_details = outcome.error_details.clone();
    event.detection_triggers = outcome.detection_triggers.clone();
    Ok(event)
}

/// Executor that never touches a browser: every step succeeds after its
/// expected delay unless a failure has been scripted for its route.
#[derive(Debug, Default)]
pub struct SimulatedExecutor {
    /// route_id to error code; the step fails this many times, then succeeds.
    failures: std::sync::Mutex<HashMap<String, (String, u32)>>,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_route(&self, route_id: impl Into<String>, error_code: impl Into<String>, times: u32) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(route_id.into(), (error_code.into(), times));
        }
    }
}

#[async_trait::async_trait]
impl StepExecutor for SimulatedExecutor {
    async fn execute(&self, step: &crate::model::RouteStep, _ctx: &NavigationContext) -> StepOutcome {
        let duration_ms = (step.expected_delay * 1000.0) as u64;
        if let Ok(mut failures) = self.failures.lock()
            && let Some((code, remaining)) = failures.get_mut(&step.route_id)
        {
            if *remaining > 0 {
                *remaining -= 1;
                return StepOutcome::failure(code.clone(), duration_ms);
            }
            failures.remove(&step.route_id);
        }
        StepOutcome::success(duration_ms)
    }
}
