pub mod adapt;
pub mod error;
pub mod graph;
pub mod history;
pub mod model;
pub mod optimize;
pub mod planner;
pub mod service;
pub mod session;
pub mod stealth;
pub mod store;

pub use adapt::{AdaptationEngine, AdaptationOutcome, AdaptationStrategy, ObstacleKind};
pub use error::{NavError, Result};
pub use graph::{GraphSnapshot, GraphStats, RouteGraph};
pub use model::{
    ActionType, EventOutcome, NavigationEvent, NavigationRoute, PathPlan, PlanStatus, RouteStep,
    RouteType, TraversalMethod,
};
pub use optimize::RouteOptimizer;
pub use planner::{OptimizationStrategy, PathPlanner, PlannedRoutes};
pub use service::{NavigationReport, NavigationService, ServiceConfig, SimulatedExecutor};
pub use session::{ContextStore, NavigationContext};
pub use stealth::{
    CancelFlag, HeuristicRiskAssessor, HeuristicSelectorEngine, RiskAssessor, SelectorEngine,
    StepExecutor, StepOutcome,
};
