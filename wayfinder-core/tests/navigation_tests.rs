// End-to-end tests for planning, adaptation and persistence

use std::sync::Arc;
use tempfile::TempDir;
use wayfinder_core::history::HistoryStore;
use wayfinder_core::model::{NavigationRoute, RouteType, TraversalMethod};
use wayfinder_core::planner::OptimizationStrategy;
use wayfinder_core::store;
use wayfinder_core::{
    EventOutcome, HeuristicRiskAssessor, NavError, NavigationService, PathPlanner, RouteGraph,
    ServiceConfig, SimulatedExecutor, StepExecutor,
};

fn shop_graph() -> RouteGraph {
    let mut graph = RouteGraph::new("shop");
    let routes = [
        ("home->products", "home", "products", RouteType::Link, 1.2),
        ("products->cart", "products", "cart", RouteType::ClientSide, 1.5),
        ("cart->checkout", "cart", "checkout", RouteType::Form, 1.8),
        ("home->about", "home", "about", RouteType::Link, 1.0),
        ("about->cart", "about", "cart", RouteType::Link, 2.0),
        ("home->search", "home", "search", RouteType::Api, 0.8),
    ];
    for (id, src, dst, route_type, weight) in routes {
        let method = match route_type {
            RouteType::Form => TraversalMethod::FormSubmit,
            RouteType::Api => TraversalMethod::ApiCall,
            RouteType::ClientSide => TraversalMethod::ClientRoute,
            _ => TraversalMethod::Click,
        };
        let mut route =
            NavigationRoute::new(id, src, dst, route_type, method, 0.9, 0.1).unwrap();
        if route_type == RouteType::Form {
            route = route.with_interactions(vec![
                wayfinder_core::model::InteractionRequirement {
                    kind: "input".to_string(),
                    target_selector: "#card-number".to_string(),
                    required_data: None,
                    timing_delay: 0.5,
                },
            ]);
        }
        graph.add_route(route).unwrap();
        graph.add_connection(src, dst, weight).unwrap();
    }
    graph
}

fn quiet_service(executor: Arc<dyn StepExecutor>) -> NavigationService {
    NavigationService::new(
        shop_graph(),
        Arc::new(HeuristicRiskAssessor),
        executor,
        ServiceConfig {
            pace_steps: false,
            learn: false,
            ..ServiceConfig::default()
        },
    )
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn test_planner_prefers_low_weight_path() {
    let planner = PathPlanner::new(Arc::new(HeuristicRiskAssessor));
    let plan = planner.plan(&shop_graph(), "home", "cart", 0.5).unwrap();

    let pages: Vec<&str> = plan
        .route_sequence
        .iter()
        .map(|s| s.target_url.as_str())
        .collect();
    // 1.2 + 1.5 through products beats 1.0 + 2.0 through about.
    assert_eq!(pages, vec!["products", "cart"]);
    assert!((plan.estimated_duration - 2.7).abs() < 1e-9);
}

#[test]
fn test_planner_alternatives_are_distinct() {
    let planner = PathPlanner::new(Arc::new(HeuristicRiskAssessor));
    let planned = planner
        .plan_with_alternatives(&shop_graph(), "home", "cart", 0.5)
        .unwrap();

    let primary_pages: Vec<String> = planned
        .primary
        .route_sequence
        .iter()
        .map(|s| s.target_url.clone())
        .collect();
    for alt in &planned.alternatives {
        let alt_pages: Vec<String> = alt
            .route_sequence
            .iter()
            .map(|s| s.target_url.clone())
            .collect();
        assert_ne!(alt_pages, primary_pages);
        assert!(alt.metadata.contains_key("strategy"));
    }
}

#[test]
fn test_strategy_labels_are_stable() {
    assert_eq!(OptimizationStrategy::MinimizeRisk.as_str(), "minimize_risk");
    assert_eq!(OptimizationStrategy::Balanced.as_str(), "balanced");
}

// ============================================================================
// Navigation and adaptation
// ============================================================================

#[tokio::test]
async fn test_full_session_with_transient_failures() {
    let executor = Arc::new(SimulatedExecutor::new());
    executor.fail_route("products->cart", "element_not_found", 2);
    let service = quiet_service(executor);

    let report = service.navigate("home", "checkout").await.unwrap();
    assert!(report.completed());
    assert_eq!(report.retries, 2);
    assert_eq!(report.adaptations, 0);

    let failures = report
        .events
        .iter()
        .filter(|e| e.outcome == EventOutcome::Failure)
        .count();
    assert_eq!(failures, 2);
}

#[tokio::test]
async fn test_session_routes_around_permanent_block() {
    let executor = Arc::new(SimulatedExecutor::new());
    executor.fail_route("home->products", "blocked", u32::MAX);
    let service = quiet_service(executor);

    let report = service.navigate("home", "checkout").await.unwrap();
    assert!(report.completed());
    assert!(report.adaptations >= 1);

    // The successful tail of the session must detour via "about".
    let succeeded: Vec<&str> = report
        .events
        .iter()
        .filter(|e| e.outcome == EventOutcome::Success)
        .map(|e| e.route_id.as_str())
        .collect();
    assert!(!succeeded.contains(&"home->products"));
    assert!(succeeded.contains(&"home->about"));
    assert!(succeeded.contains(&"cart->checkout"));
}

#[tokio::test]
async fn test_unreachable_target_is_an_error() {
    let service = quiet_service(Arc::new(SimulatedExecutor::new()));
    let err = service.navigate("search", "home").await.unwrap_err();
    assert!(matches!(err, NavError::NoPathFound { .. }));
}

// ============================================================================
// History and persistence
// ============================================================================

#[tokio::test]
async fn test_history_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("history.db");

    let session_id = {
        let service = quiet_service(Arc::new(SimulatedExecutor::new()))
            .with_history(HistoryStore::open(&db_path).unwrap());
        service.navigate("home", "cart").await.unwrap().session_id
    };

    let reopened = HistoryStore::open(&db_path).unwrap();
    assert_eq!(
        reopened.session_status(&session_id).unwrap().as_deref(),
        Some("completed")
    );
    assert_eq!(reopened.events_for_session(&session_id).unwrap().len(), 2);
}

#[test]
fn test_graph_snapshot_round_trip_through_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("graph.json");
    let graph = shop_graph();

    store::save_graph(&graph, &path).unwrap();
    let loaded = store::load_graph(&path).unwrap();

    assert_eq!(loaded.stats().locations, graph.stats().locations);
    assert_eq!(loaded.stats().routes, graph.stats().routes);
    assert_eq!(loaded.weight_between("home", "products"), Some(1.2));

    // A plan built from the reloaded graph matches one from the original.
    let planner = PathPlanner::new(Arc::new(HeuristicRiskAssessor));
    let a = planner.plan(&graph, "home", "checkout", 0.5).unwrap();
    let b = planner.plan(&loaded, "home", "checkout", 0.5).unwrap();
    let seq = |p: &wayfinder_core::PathPlan| {
        p.route_sequence
            .iter()
            .map(|s| s.target_url.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(seq(&a), seq(&b));
}
