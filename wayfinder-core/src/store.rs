// JSON persistence for graph snapshots and plans. Snapshots are the
// interchange format; the live petgraph structure is rebuilt on load.

use crate::error::Result;
use crate::graph::{GraphSnapshot, RouteGraph};
use crate::model::PathPlan;
use std::fs;
use std::path::Path;
use tracing::info;

pub fn save_graph(graph: &RouteGraph, path: &Path) -> Result<()> {
    let snapshot = graph.to_snapshot();
    write_json(&snapshot, path)?;
    info!(
        path = %path.display(),
        locations = snapshot.locations.len(),
        routes = snapshot.routes.len(),
        "graph saved"
    );
    Ok(())
}

pub fn load_graph(path: &Path) -> Result<RouteGraph> {
    let raw = fs::read_to_string(path)?;
    let snapshot: GraphSnapshot = serde_json::from_str(&raw)?;
    RouteGraph::from_snapshot(snapshot)
}

pub fn save_plan(plan: &PathPlan, path: &Path) -> Result<()> {
    write_json(plan, path)?;
    info!(path = %path.display(), plan_id = %plan.plan_id, "plan saved");
    Ok(())
}

pub fn load_plan(path: &Path) -> Result<PathPlan> {
    let raw = fs::read_to_string(path)?;
    let plan: PathPlan = serde_json::from_str(&raw)?;
    plan.verify_invariants()?;
    Ok(plan)
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NavigationRoute, RouteType, TraversalMethod};

    fn sample_graph() -> RouteGraph {
        let mut g = RouteGraph::new("persist");
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
        g.add_route(route).unwrap();
        g.add_connection("home", "products", 1.2).unwrap();
        g
    }

    #[test]
    fn test_graph_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let graph = sample_graph();

        save_graph(&graph, &path).unwrap();
        let loaded = load_graph(&path).unwrap();

        assert_eq!(loaded.graph_id(), graph.graph_id());
        assert_eq!(loaded.weight_between("home", "products"), Some(1.2));
        assert!(loaded.route("home->products").is_some());
    }

    #[test]
    fn test_load_rejects_malformed_graph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"not\": \"a graph\"}").unwrap();
        assert!(load_graph(&path).is_err());
    }

    #[test]
    fn test_plan_round_trip() {
        use crate::planner::PathPlanner;
        use crate::stealth::HeuristicRiskAssessor;
        use std::sync::Arc;

        let graph = sample_graph();
        let planner = PathPlanner::new(Arc::new(HeuristicRiskAssessor));
        let plan = planner.plan(&graph, "home", "products", 0.5).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans/plan.json");
        save_plan(&plan, &path).unwrap();

        let loaded = load_plan(&path).unwrap();
        assert_eq!(loaded.plan_id, plan.plan_id);
        assert_eq!(loaded.route_sequence.len(), plan.route_sequence.len());
    }
}
