// Data model for routes, plans and navigation events

use crate::error::{NavError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Link,
    Form,
    Api,
    ClientSide,
    JavascriptTriggered,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Link => "link",
            RouteType::Form => "form",
            RouteType::Api => "api",
            RouteType::ClientSide => "client_side",
            RouteType::JavascriptTriggered => "javascript_triggered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMethod {
    Click,
    FormSubmit,
    ApiCall,
    ClientRoute,
    JsExec,
}

impl TraversalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraversalMethod::Click => "click",
            TraversalMethod::FormSubmit => "form_submit",
            TraversalMethod::ApiCall => "api_call",
            TraversalMethod::ClientRoute => "client_route",
            TraversalMethod::JsExec => "js_exec",
        }
    }

    /// The step action used when executing a route of this traversal method.
    pub fn action(&self) -> ActionType {
        match self {
            TraversalMethod::Click => ActionType::Click,
            TraversalMethod::FormSubmit => ActionType::FormSubmit,
            TraversalMethod::ApiCall => ActionType::ApiCall,
            TraversalMethod::ClientRoute => ActionType::Navigate,
            TraversalMethod::JsExec => ActionType::JsExec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    FormSubmit,
    JsExec,
    ApiCall,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::FormSubmit => "form_submit",
            ActionType::JsExec => "js_exec",
            ActionType::ApiCall => "api_call",
        }
    }

    /// Additive detection-risk surcharge for executing this action type.
    pub fn risk_surcharge(&self) -> f64 {
        match self {
            ActionType::Navigate => 0.1,
            ActionType::Click => 0.1,
            ActionType::FormSubmit => 0.2,
            ActionType::JsExec => 0.3,
            ActionType::ApiCall => 0.1,
        }
    }
}

/// A single interaction needed before a route can be traversed, e.g. filling
/// a form field before submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequirement {
    pub kind: String,
    pub target_selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_data: Option<serde_json::Value>,
    /// Delay before performing the interaction, in seconds.
    #[serde(default)]
    pub timing_delay: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConstraints {
    pub min_delay: f64,
    pub max_delay: f64,
    pub interaction_delay: f64,
    pub page_load_delay: f64,
}

impl Default for TimingConstraints {
    fn default() -> Self {
        Self {
            min_delay: 0.5,
            max_delay: 5.0,
            interaction_delay: 0.5,
            page_load_delay: 1.0,
        }
    }
}

/// A directed, traversable edge between two navigation locations.
///
/// Construction validates invariants up front: risk and confidence
/// must already be inside [0,1] (hard error, never coerced), and form-submit
/// routes must carry at least one interaction requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationRoute {
    pub route_id: String,
    pub source: String,
    pub destination: String,
    pub route_type: RouteType,
    pub traversal_method: TraversalMethod,
    pub selector_confidence: f64,
    pub detection_risk: f64,
    #[serde(default)]
    pub interaction_requirements: Vec<InteractionRequirement>,
    #[serde(default)]
    pub timing: TimingConstraints,
    /// Whether the route's selectors were validated against a live page.
    #[serde(default)]
    pub validated: bool,
}

fn unit_range(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(NavError::InvalidRoute(format!(
            "{} must be within [0,1], got {}",
            name, value
        )));
    }
    Ok(())
}

impl NavigationRoute {
    pub fn new(
        route_id: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        route_type: RouteType,
        traversal_method: TraversalMethod,
        selector_confidence: f64,
        detection_risk: f64,
    ) -> Result<Self> {
        let route_id = route_id.into();
        let source = source.into();
        let destination = destination.into();

        if route_id.is_empty() {
            return Err(NavError::InvalidRoute("route_id is empty".to_string()));
        }
        if source.is_empty() || destination.is_empty() {
            return Err(NavError::InvalidRoute(format!(
                "route '{}' has an empty endpoint",
                route_id
            )));
        }
        unit_range("selector_confidence", selector_confidence)?;
        unit_range("detection_risk", detection_risk)?;

        Ok(Self {
            route_id,
            source,
            destination,
            route_type,
            traversal_method,
            selector_confidence,
            detection_risk,
            interaction_requirements: Vec::new(),
            timing: TimingConstraints::default(),
            validated: false,
        })
    }

    pub fn with_interactions(mut self, interactions: Vec<InteractionRequirement>) -> Self {
        self.interaction_requirements = interactions;
        self
    }

    pub fn with_timing(mut self, timing: TimingConstraints) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_validated(mut self, validated: bool) -> Self {
        self.validated = validated;
        self
    }

    /// Checks invariants that can only be enforced once the route is fully
    /// assembled. Called by `RouteGraph::add_route`.
    pub fn validate(&self) -> Result<()> {
        unit_range("selector_confidence", self.selector_confidence)?;
        unit_range("detection_risk", self.detection_risk)?;
        if self.traversal_method == TraversalMethod::FormSubmit
            && self.interaction_requirements.is_empty()
        {
            return Err(NavError::InvalidRoute(format!(
                "form-submit route '{}' has no interaction requirements",
                self.route_id
            )));
        }
        Ok(())
    }

    /// Default edge weight for this route: estimated traversal time plus the
    /// detection-risk component.
    pub fn base_weight(&self) -> f64 {
        let time = (self.timing.page_load_delay + self.timing.interaction_delay).max(0.1);
        time + self.detection_risk
    }

    /// Production-ready routes are safe to execute without re-validation.
    pub fn is_production_ready(&self) -> bool {
        self.selector_confidence > 0.8 && self.detection_risk < 0.3 && self.validated
    }
}

/// One executable step of a path plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStep {
    pub step_number: usize,
    pub route_id: String,
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_selector: Option<String>,
    pub target_url: String,
    /// Expected wall-clock delay for this step, in seconds.
    pub expected_delay: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_data: Option<serde_json::Value>,
    #[serde(default)]
    pub description: String,
    /// Free-form provenance, e.g. `stealth_enhanced: true`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RouteStep {
    pub fn new(
        step_number: usize,
        route_id: impl Into<String>,
        action_type: ActionType,
        target_url: impl Into<String>,
        expected_delay: f64,
    ) -> Self {
        Self {
            step_number,
            route_id: route_id.into(),
            action_type,
            target_selector: None,
            target_url: target_url.into(),
            expected_delay: expected_delay.max(0.0),
            interaction_data: None,
            description: String::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn is_stealth_enhanced(&self) -> bool {
        self.metadata
            .get("stealth_enhanced")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Planned,
    Executing,
    /// Superseded by a replacement plan mid-session.
    Adapting,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Planned => "planned",
            PlanStatus::Executing => "executing",
            PlanStatus::Adapting => "adapting",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }
}

/// An ordered, executable sequence of route steps from a source to a target.
///
/// Plans are replaced rather than rewritten: adaptation only ever advances or
/// rewinds `current_step` in place, every other change produces a new plan
/// that back-references this one through `fallback_plans`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathPlan {
    pub plan_id: String,
    pub source_context: String,
    pub target_destination: String,
    pub route_sequence: Vec<RouteStep>,
    pub total_risk_score: f64,
    pub estimated_duration: f64,
    /// Plan ids this plan falls back from - lookup keys, never ownership.
    #[serde(default)]
    pub fallback_plans: Vec<String>,
    pub status: PlanStatus,
    pub current_step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PathPlan {
    /// Builds a plan from a step sequence, renumbering steps densely from 1
    /// and deriving duration from the per-step delays.
    pub fn new(
        source_context: impl Into<String>,
        target_destination: impl Into<String>,
        mut steps: Vec<RouteStep>,
    ) -> Self {
        for (i, step) in steps.iter_mut().enumerate() {
            step.step_number = i + 1;
        }
        let estimated_duration = steps.iter().map(|s| s.expected_delay).sum();
        let now = Utc::now();
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            source_context: source_context.into(),
            target_destination: target_destination.into(),
            route_sequence: steps,
            total_risk_score: 0.0,
            estimated_duration,
            fallback_plans: Vec::new(),
            status: PlanStatus::Planned,
            current_step: 0,
            degradation_reason: None,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Verifies the dense 1-based step numbering and duration invariants.
    pub fn verify_invariants(&self) -> Result<()> {
        for (i, step) in self.route_sequence.iter().enumerate() {
            if step.step_number != i + 1 {
                return Err(NavError::InvalidRoute(format!(
                    "plan '{}' step at index {} is numbered {}",
                    self.plan_id, i, step.step_number
                )));
            }
        }
        let expected: f64 = self.route_sequence.iter().map(|s| s.expected_delay).sum();
        if (expected - self.estimated_duration).abs() > 1e-9 {
            return Err(NavError::InvalidRoute(format!(
                "plan '{}' duration {} does not match step sum {}",
                self.plan_id, self.estimated_duration, expected
            )));
        }
        Ok(())
    }

    /// Recomputes `estimated_duration` after a step mutation.
    pub fn recompute_duration(&mut self) {
        self.estimated_duration = self.route_sequence.iter().map(|s| s.expected_delay).sum();
        self.updated_at = Utc::now();
    }

    pub fn advance(&mut self) {
        if self.current_step < self.route_sequence.len() {
            self.current_step += 1;
            self.updated_at = Utc::now();
        }
    }

    /// Rewinds the cursor by one step for an in-place retry.
    pub fn rewind(&mut self) {
        self.current_step = self.current_step.saturating_sub(1);
        self.updated_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.current_step >= self.route_sequence.len()
    }

    /// Fraction of steps already executed, in [0,1].
    pub fn progress(&self) -> f64 {
        if self.route_sequence.is_empty() {
            return 1.0;
        }
        self.current_step as f64 / self.route_sequence.len() as f64
    }

    /// Steps not yet executed, the failing step included.
    pub fn remaining_steps(&self) -> &[RouteStep] {
        &self.route_sequence[self.current_step.min(self.route_sequence.len())..]
    }

    /// The location the session currently sits at while executing this plan.
    pub fn current_location(&self) -> &str {
        if self.current_step == 0 {
            &self.source_context
        } else {
            &self.route_sequence[self.current_step - 1].target_url
        }
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            plan_id: self.plan_id.clone(),
            source: self.source_context.clone(),
            target: self.target_destination.clone(),
            status: self.status,
            steps: self.route_sequence.len(),
            current_step: self.current_step,
            total_risk_score: self.total_risk_score,
            estimated_duration: self.estimated_duration,
            fallback_plans: self.fallback_plans.clone(),
            degradation_reason: self.degradation_reason.clone(),
        }
    }
}

/// Status snapshot of a plan for observability tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: String,
    pub source: String,
    pub target: String,
    pub status: PlanStatus,
    pub steps: usize,
    pub current_step: usize,
    pub total_risk_score: f64,
    pub estimated_duration: f64,
    pub fallback_plans: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Success,
    Failure,
    Timeout,
    Detected,
    Redirected,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Success => "success",
            EventOutcome::Failure => "failure",
            EventOutcome::Timeout => "timeout",
            EventOutcome::Detected => "detected",
            EventOutcome::Redirected => "redirected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(EventOutcome::Success),
            "failure" => Some(EventOutcome::Failure),
            "timeout" => Some(EventOutcome::Timeout),
            "detected" => Some(EventOutcome::Detected),
            "redirected" => Some(EventOutcome::Redirected),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EventOutcome::Success)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub duration_ms: u64,
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub memory_bytes: u64,
    #[serde(default)]
    pub dom_changes: u32,
    #[serde(default)]
    pub js_errors: u32,
}

/// Immutable record of one executed step or monitoring tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub event_id: String,
    pub route_id: String,
    pub context_before: String,
    pub context_after: String,
    pub outcome: EventOutcome,
    #[serde(default)]
    pub metrics: PerformanceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    pub stealth_score_before: f64,
    pub stealth_score_after: f64,
    #[serde(default)]
    pub detection_triggers: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NavigationEvent {
    pub fn new(
        route_id: impl Into<String>,
        context_before: impl Into<String>,
        context_after: impl Into<String>,
        outcome: EventOutcome,
        stealth_score_before: f64,
        stealth_score_after: f64,
    ) -> Result<Self> {
        unit_range("stealth_score_before", stealth_score_before)
            .map_err(|_| invalid_stealth("stealth_score_before", stealth_score_before))?;
        unit_range("stealth_score_after", stealth_score_after)
            .map_err(|_| invalid_stealth("stealth_score_after", stealth_score_after))?;

        Ok(Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            route_id: route_id.into(),
            context_before: context_before.into(),
            context_after: context_after.into(),
            outcome,
            metrics: PerformanceMetrics::default(),
            error_code: None,
            error_details: None,
            stealth_score_before,
            stealth_score_after,
            detection_triggers: Vec::new(),
            recorded_at: Utc::now(),
        })
    }

    pub fn with_metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, details: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self.error_details = Some(details.into());
        self
    }

    pub fn with_detection_triggers(mut self, triggers: Vec<String>) -> Self {
        self.detection_triggers = triggers;
        self
    }
}

fn invalid_stealth(name: &str, value: f64) -> NavError {
    NavError::InvalidRoute(format!("{} must be within [0,1], got {}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(risk: f64, confidence: f64) -> Result<NavigationRoute> {
        NavigationRoute::new(
            "r1",
            "https://example.com/",
            "https://example.com/about",
            RouteType::Link,
            TraversalMethod::Click,
            confidence,
            risk,
        )
    }

    #[test]
    fn test_route_construction_valid() {
        let r = route(0.2, 0.9).unwrap();
        assert_eq!(r.route_id, "r1");
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_route_rejects_out_of_range_risk() {
        assert!(route(1.2, 0.9).is_err());
        assert!(route(-0.1, 0.9).is_err());
        assert!(route(0.2, 1.5).is_err());
    }

    #[test]
    fn test_form_route_requires_interactions() {
        let r = NavigationRoute::new(
            "f1",
            "https://example.com/login",
            "https://example.com/account",
            RouteType::Form,
            TraversalMethod::FormSubmit,
            0.9,
            0.3,
        )
        .unwrap();
        assert!(r.validate().is_err());

        let r = r.with_interactions(vec![InteractionRequirement {
            kind: "fill".to_string(),
            target_selector: "input[name=user]".to_string(),
            required_data: None,
            timing_delay: 0.4,
        }]);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_plan_step_numbering_dense() {
        let steps = vec![
            RouteStep::new(9, "a", ActionType::Navigate, "u1", 1.0),
            RouteStep::new(3, "b", ActionType::Navigate, "u2", 2.0),
        ];
        let plan = PathPlan::new("u0", "u2", steps);
        assert_eq!(plan.route_sequence[0].step_number, 1);
        assert_eq!(plan.route_sequence[1].step_number, 2);
        assert!((plan.estimated_duration - 3.0).abs() < 1e-9);
        assert!(plan.verify_invariants().is_ok());
    }

    #[test]
    fn test_plan_progress_and_cursor() {
        let steps = vec![
            RouteStep::new(1, "a", ActionType::Navigate, "u1", 1.0),
            RouteStep::new(2, "b", ActionType::Navigate, "u2", 1.0),
        ];
        let mut plan = PathPlan::new("u0", "u2", steps);
        assert_eq!(plan.progress(), 0.0);
        assert_eq!(plan.current_location(), "u0");
        plan.advance();
        assert_eq!(plan.progress(), 0.5);
        assert_eq!(plan.current_location(), "u1");
        plan.rewind();
        assert_eq!(plan.current_step, 0);
        plan.advance();
        plan.advance();
        assert!(plan.is_complete());
    }

    #[test]
    fn test_event_rejects_out_of_range_stealth_score() {
        let bad = NavigationEvent::new("r1", "u0", "u1", EventOutcome::Success, 0.5, 1.3);
        assert!(bad.is_err());
        let ok = NavigationEvent::new("r1", "u0", "u1", EventOutcome::Success, 0.5, 0.6);
        assert!(ok.is_ok());
    }
}
