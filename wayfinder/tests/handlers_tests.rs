use std::sync::Arc;
use wayfinder::handlers::*;
use wayfinder_core::model::{NavigationRoute, RouteType, TraversalMethod};
use wayfinder_core::{HeuristicRiskAssessor, PathPlanner, RouteGraph};

fn sample_plan() -> wayfinder_core::PathPlan {
    let mut graph = RouteGraph::new("cli");
    let route = NavigationRoute::new(
        "home->products",
        "home",
        "products",
        RouteType::Link,
        TraversalMethod::Click,
        0.9,
        0.1,
    )
    .unwrap();
    graph.add_route(route).unwrap();
    graph.add_connection("home", "products", 1.2).unwrap();

    PathPlanner::new(Arc::new(HeuristicRiskAssessor))
        .plan(&graph, "home", "products", 0.5)
        .unwrap()
}

#[test]
fn test_resolve_path_expands_tilde() {
    let path = resolve_path("~/graphs/site.json");
    assert!(!path.to_string_lossy().starts_with('~'));
    assert!(path.to_string_lossy().ends_with("graphs/site.json"));
}

#[test]
fn test_resolve_path_leaves_absolute_paths() {
    let path = resolve_path("/tmp/graph.json");
    assert_eq!(path.to_string_lossy(), "/tmp/graph.json");
}

#[test]
fn test_plan_summary_has_header_and_steps() {
    let plan = sample_plan();
    let lines = plan_summary_lines(&plan);

    assert_eq!(lines.len(), 1 + plan.route_sequence.len());
    assert!(lines[0].contains("home -> products"));
    assert!(lines[0].contains("1 steps"));
    assert!(lines[1].contains("products"));
    assert!(lines[1].starts_with("  1."));
}

#[test]
fn test_plan_summary_reports_duration() {
    let plan = sample_plan();
    let lines = plan_summary_lines(&plan);
    assert!(lines[0].contains("~1.2s"));
}
