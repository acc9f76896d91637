// External collaborator interfaces: risk assessment, selector validation and
// step execution. The core only ever talks to these through the traits below,
// wired in by whoever owns the NavigationService.

use crate::model::{ActionType, PerformanceMetrics, RouteStep, RouteType};
use crate::session::NavigationContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Human-like timing distribution for one interaction type, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TimingPattern {
    pub min_delay: f64,
    pub max_delay: f64,
    pub mean_delay: f64,
    pub std_dev: f64,
}

impl TimingPattern {
    /// Deterministic upper-band sample: mean plus one standard deviation,
    /// capped at the distribution maximum. Used by stealth enhancement so the
    /// resampled delay is never below the human floor.
    pub fn humanized_delay(&self) -> f64 {
        (self.mean_delay + self.std_dev).min(self.max_delay)
    }
}

/// Metadata handed to a risk assessor when scoring a prospective route.
#[derive(Debug, Clone)]
pub struct RouteMetadata {
    pub url: String,
    pub route_type: RouteType,
    pub same_site: bool,
    pub has_query_params: bool,
}

/// Stealth system interface: scores routes and supplies human timing models.
pub trait RiskAssessor: Send + Sync {
    /// Estimated detection risk for the route, in [0,1].
    fn assess_route_risk(&self, meta: &RouteMetadata) -> f64;

    /// Human timing distribution for the given action type.
    fn timing_patterns(&self, action: ActionType) -> TimingPattern;
}

/// Selector/extraction engine interface, used during route discovery.
pub trait SelectorEngine: Send + Sync {
    fn selectors_for_route(&self, url: &str) -> Vec<String>;

    /// Aggregate confidence for a selector set, in [0,1].
    fn validate_route_selectors(&self, selectors: &[String]) -> f64;
}

/// Raw outcome of executing one step against the browser driver.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub success: bool,
    pub metrics: PerformanceMetrics,
    pub error_code: Option<String>,
    pub error_details: Option<String>,
    /// Stealth score observed after the step, in [0,1].
    pub stealth_score: f64,
    pub detection_triggers: Vec<String>,
}

impl StepOutcome {
    pub fn success(duration_ms: u64) -> Self {
        Self {
            success: true,
            metrics: PerformanceMetrics {
                duration_ms,
                ..PerformanceMetrics::default()
            },
            error_code: None,
            error_details: None,
            stealth_score: 0.1,
            detection_triggers: Vec::new(),
        }
    }

    pub fn failure(error_code: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            metrics: PerformanceMetrics {
                duration_ms,
                ..PerformanceMetrics::default()
            },
            error_code: Some(error_code.into()),
            error_details: None,
            stealth_score: 0.2,
            detection_triggers: Vec::new(),
        }
    }
}

/// Browser-automation driver seam. The core treats execution as an opaque
/// async call and builds `NavigationEvent`s from the returned outcome.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &RouteStep, ctx: &NavigationContext) -> StepOutcome;
}

/// Cooperative cancellation flag shared between a caller and an in-flight
/// discovery, planning or navigation task. Checked at suspension points.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Built-in assessor with empirically chosen heuristics. Deterministic, so
/// planning over a fixed graph always yields the same plan.
#[derive(Debug, Clone, Default)]
pub struct HeuristicRiskAssessor;

impl RiskAssessor for HeuristicRiskAssessor {
    fn assess_route_risk(&self, meta: &RouteMetadata) -> f64 {
        let mut risk: f64 = 0.1;
        risk += match meta.route_type {
            RouteType::Link => 0.0,
            RouteType::ClientSide => 0.05,
            RouteType::Api => 0.1,
            RouteType::Form => 0.15,
            RouteType::JavascriptTriggered => 0.2,
        };
        if !meta.same_site {
            risk += 0.15;
        }
        if meta.has_query_params {
            risk += 0.05;
        }
        risk.clamp(0.0, 1.0)
    }

    fn timing_patterns(&self, action: ActionType) -> TimingPattern {
        match action {
            ActionType::Navigate => TimingPattern {
                min_delay: 0.5,
                max_delay: 4.0,
                mean_delay: 1.6,
                std_dev: 0.4,
            },
            ActionType::Click => TimingPattern {
                min_delay: 0.3,
                max_delay: 2.5,
                mean_delay: 0.9,
                std_dev: 0.3,
            },
            ActionType::FormSubmit => TimingPattern {
                min_delay: 1.2,
                max_delay: 8.0,
                mean_delay: 3.1,
                std_dev: 0.8,
            },
            ActionType::JsExec => TimingPattern {
                min_delay: 0.2,
                max_delay: 1.5,
                mean_delay: 0.6,
                std_dev: 0.2,
            },
            ActionType::ApiCall => TimingPattern {
                min_delay: 0.1,
                max_delay: 1.0,
                mean_delay: 0.3,
                std_dev: 0.1,
            },
        }
    }
}

/// Selector engine fallback that derives confidence from selector count.
/// Real deployments plug in a site-specific extraction engine instead.
#[derive(Debug, Clone, Default)]
pub struct HeuristicSelectorEngine;

impl SelectorEngine for HeuristicSelectorEngine {
    fn selectors_for_route(&self, url: &str) -> Vec<String> {
        vec![format!("a[href=\"{}\"]", url)]
    }

    fn validate_route_selectors(&self, selectors: &[String]) -> f64 {
        match selectors.len() {
            0 => 0.0,
            1 => 0.7,
            2 => 0.85,
            _ => 0.95,
        }
    }
}
