// Directed weighted route graph plus the search primitives the planner uses.

use crate::error::{NavError, Result};
use crate::model::NavigationRoute;
use petgraph::algo;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::hash::RandomState;
use tracing::debug;

/// Hard cap on enumerated simple paths to avoid combinatorial blowup.
const MAX_SIMPLE_PATHS: usize = 100;

/// A directed weighted graph of navigation routes. Nodes are locations
/// (URLs or logical pages), edges carry a combined time+risk traversal cost.
///
/// A graph belongs to one discovery session. Adaptation clones it before
/// pruning nodes, so a planner reading the original never races a mutator.
#[derive(Debug, Clone)]
pub struct RouteGraph {
    graph_id: String,
    graph: StableDiGraph<String, f64>,
    nodes: HashMap<String, NodeIndex>,
    routes: HashMap<String, NavigationRoute>,
    route_by_pair: HashMap<(String, String), String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub locations: usize,
    pub routes: usize,
    pub connections: usize,
    pub average_degree: f64,
    pub low_risk_routes: usize,
    pub medium_risk_routes: usize,
    pub high_risk_routes: usize,
    pub production_ready_routes: usize,
}

/// Serializable snapshot for persistence round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub graph_id: String,
    pub locations: Vec<String>,
    pub routes: Vec<NavigationRoute>,
    pub connections: Vec<ConnectionSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

// Min-heap entry for Dijkstra. Ties break on node index so a fixed graph
// always expands in the same order.
struct QueueEntry {
    cost: f64,
    node: NodeIndex,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.index().cmp(&self.node.index()))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl RouteGraph {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            graph: StableDiGraph::new(),
            nodes: HashMap::new(),
            routes: HashMap::new(),
            route_by_pair: HashMap::new(),
        }
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn location_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_location(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn route(&self, route_id: &str) -> Option<&NavigationRoute> {
        self.routes.get(route_id)
    }

    pub fn routes(&self) -> impl Iterator<Item = &NavigationRoute> {
        self.routes.values()
    }

    pub fn route_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.routes.keys().cloned()
    }

    /// (source, destination) of the named route.
    pub fn endpoints_of(&self, route_id: &str) -> Option<(String, String)> {
        self.routes
            .get(route_id)
            .map(|r| (r.source.clone(), r.destination.clone()))
    }

    /// The route record covering the (source, destination) pair, if any.
    pub fn route_between(&self, source: &str, destination: &str) -> Option<&NavigationRoute> {
        self.route_by_pair
            .get(&(source.to_string(), destination.to_string()))
            .and_then(|id| self.routes.get(id))
    }

    /// Adds a location node if not already present.
    pub fn add_location(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return false;
        }
        let idx = self.graph.add_node(id.clone());
        self.nodes.insert(id, idx);
        true
    }

    /// Registers a route, creating its endpoint locations and a connection
    /// with the route's default weight when none exists yet.
    ///
    /// Fails fast on a duplicate route id or an invariant violation; the
    /// graph is left untouched on error.
    pub fn add_route(&mut self, route: NavigationRoute) -> Result<()> {
        route.validate()?;
        if self.routes.contains_key(&route.route_id) {
            return Err(NavError::InvalidRoute(format!(
                "route '{}' already present",
                route.route_id
            )));
        }

        self.add_location(route.source.clone());
        self.add_location(route.destination.clone());

        let src = self.nodes[&route.source];
        let dst = self.nodes[&route.destination];
        if self.graph.find_edge(src, dst).is_none() {
            self.graph.add_edge(src, dst, route.base_weight());
        }

        let pair = (route.source.clone(), route.destination.clone());
        self.route_by_pair
            .entry(pair)
            .or_insert_with(|| route.route_id.clone());
        debug!(route_id = %route.route_id, "route added");
        self.routes.insert(route.route_id.clone(), route);
        Ok(())
    }

    /// Removes a route. The connection over its (source, destination) pair
    /// is dropped only when no other route still covers that pair. Fails if
    /// the id is unknown.
    pub fn remove_route(&mut self, route_id: &str) -> Result<NavigationRoute> {
        let route = self
            .routes
            .remove(route_id)
            .ok_or_else(|| NavError::InvalidRoute(format!("unknown route '{}'", route_id)))?;

        let pair = (route.source.clone(), route.destination.clone());
        let survivor = self
            .routes
            .values()
            .filter(|r| r.source == route.source && r.destination == route.destination)
            .map(|r| r.route_id.clone())
            .min();
        match survivor {
            Some(id) => {
                self.route_by_pair.insert(pair, id);
            }
            None => {
                self.route_by_pair.remove(&pair);
                if let (Some(&src), Some(&dst)) =
                    (self.nodes.get(&route.source), self.nodes.get(&route.destination))
                    && let Some(edge) = self.graph.find_edge(src, dst)
                {
                    self.graph.remove_edge(edge);
                }
            }
        }
        Ok(route)
    }

    /// Removes a location node, cascading over incident connections in both
    /// directions and every route touching it. Used when adaptation prunes a
    /// blocked node. No-op error if the location is unknown.
    pub fn remove_location(&mut self, id: &str) -> Result<()> {
        let idx = self
            .nodes
            .remove(id)
            .ok_or_else(|| NavError::GraphIntegrity(format!("unknown location '{}'", id)))?;
        self.graph.remove_node(idx);
        self.routes
            .retain(|_, r| r.source != id && r.destination != id);
        self.route_by_pair
            .retain(|(s, d), _| s != id && d != id);
        debug!(location = %id, "location pruned");
        Ok(())
    }

    /// Adds or updates a weighted connection between two existing locations.
    /// Rejects missing endpoints and non-positive weights without mutating.
    pub fn add_connection(&mut self, source: &str, target: &str, weight: f64) -> Result<()> {
        if weight <= 0.0 || weight.is_nan() {
            return Err(NavError::GraphIntegrity(format!(
                "connection {} -> {} has non-positive weight {}",
                source, target, weight
            )));
        }
        let src = *self.nodes.get(source).ok_or_else(|| {
            NavError::GraphIntegrity(format!("connection source '{}' not in graph", source))
        })?;
        let dst = *self.nodes.get(target).ok_or_else(|| {
            NavError::GraphIntegrity(format!("connection target '{}' not in graph", target))
        })?;
        self.graph.update_edge(src, dst, weight);
        Ok(())
    }

    pub fn remove_connection(&mut self, source: &str, target: &str) -> Result<()> {
        let (src, dst) = self.endpoint_indices(source, target)?;
        let edge = self.graph.find_edge(src, dst).ok_or_else(|| {
            NavError::GraphIntegrity(format!("no connection {} -> {}", source, target))
        })?;
        self.graph.remove_edge(edge);
        Ok(())
    }

    pub fn weight_between(&self, source: &str, target: &str) -> Option<f64> {
        let src = *self.nodes.get(source)?;
        let dst = *self.nodes.get(target)?;
        self.graph
            .find_edge(src, dst)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
    }

    /// Outgoing neighbors with edge weights, sorted by location id for
    /// deterministic iteration.
    pub fn neighbors(&self, source: &str) -> Vec<(String, f64)> {
        let Some(&idx) = self.nodes.get(source) else {
            return Vec::new();
        };
        let mut out: Vec<(String, f64)> = self
            .graph
            .edges(idx)
            .map(|e| (self.graph[e.target()].clone(), *e.weight()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn endpoint_indices(&self, source: &str, target: &str) -> Result<(NodeIndex, NodeIndex)> {
        let src = *self.nodes.get(source).ok_or_else(|| {
            NavError::GraphIntegrity(format!("location '{}' not in graph", source))
        })?;
        let dst = *self.nodes.get(target).ok_or_else(|| {
            NavError::GraphIntegrity(format!("location '{}' not in graph", target))
        })?;
        Ok((src, dst))
    }

    /// Dijkstra over edge weights with predecessor tracking. Returns the node
    /// sequence and total weight, or None when the target is unreachable.
    pub fn shortest_path(&self, source: &str, target: &str) -> Option<(Vec<String>, f64)> {
        let (&src, &dst) = (self.nodes.get(source)?, self.nodes.get(target)?);

        let mut dist: HashMap<NodeIndex, f64> = HashMap::new();
        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut heap = BinaryHeap::new();
        dist.insert(src, 0.0);
        heap.push(QueueEntry { cost: 0.0, node: src });

        while let Some(QueueEntry { cost, node }) = heap.pop() {
            if node == dst {
                return Some((self.reconstruct(&prev, src, dst), cost));
            }
            if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
                continue;
            }
            for edge in self.graph.edges(node) {
                let next = edge.target();
                let next_cost = cost + edge.weight();
                if next_cost < *dist.get(&next).unwrap_or(&f64::INFINITY) {
                    dist.insert(next, next_cost);
                    prev.insert(next, node);
                    heap.push(QueueEntry {
                        cost: next_cost,
                        node: next,
                    });
                }
            }
        }
        None
    }

    /// A* over edge weights. The heuristic charges the graph's cheapest edge
    /// for any node that is not the goal, which is admissible and keeps the
    /// search deterministic.
    pub fn astar_path(&self, source: &str, target: &str) -> Option<(Vec<String>, f64)> {
        let (&src, &dst) = (self.nodes.get(source)?, self.nodes.get(target)?);
        let min_edge = self
            .graph
            .edge_weights()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let floor = if min_edge.is_finite() { min_edge } else { 0.0 };

        let (cost, path) = algo::astar(
            &self.graph,
            src,
            |n| n == dst,
            |e| *e.weight(),
            |n| if n == dst { 0.0 } else { floor },
        )?;
        let names = path.into_iter().map(|i| self.graph[i].clone()).collect();
        Some((names, cost))
    }

    /// Hop-count shortest path (BFS), a proxy for maximum reliability: fewer
    /// traversals means fewer chances to fail.
    pub fn fewest_hops_path(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let (&src, &dst) = (self.nodes.get(source)?, self.nodes.get(target)?);
        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut seen: HashSet<NodeIndex> = HashSet::from([src]);
        let mut queue = VecDeque::from([src]);

        while let Some(node) = queue.pop_front() {
            if node == dst {
                return Some(self.reconstruct(&prev, src, dst));
            }
            let mut targets: Vec<NodeIndex> =
                self.graph.edges(node).map(|e| e.target()).collect();
            targets.sort_by_key(|t| t.index());
            for next in targets {
                if seen.insert(next) {
                    prev.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Enumerates simple paths from source to target, bounded by `cutoff`
    /// total nodes per path (default 10) and a global result cap.
    pub fn all_simple_paths(
        &self,
        source: &str,
        target: &str,
        cutoff: usize,
    ) -> Vec<Vec<String>> {
        let (Some(&src), Some(&dst)) = (self.nodes.get(source), self.nodes.get(target)) else {
            return Vec::new();
        };
        let max_intermediate = cutoff.saturating_sub(2);
        algo::all_simple_paths::<Vec<NodeIndex>, _, RandomState>(
            &self.graph,
            src,
            dst,
            0,
            Some(max_intermediate),
        )
            .take(MAX_SIMPLE_PATHS)
            .map(|path| path.into_iter().map(|i| self.graph[i].clone()).collect())
            .collect()
    }

    /// Number of weakly connected components.
    pub fn connected_components(&self) -> usize {
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut components = 0;
        for start in self.graph.node_indices() {
            if !seen.insert(start) {
                continue;
            }
            components += 1;
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                let neighbors = self
                    .graph
                    .neighbors_undirected(node)
                    .collect::<Vec<_>>();
                for next in neighbors {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        components
    }

    pub fn stats(&self) -> GraphStats {
        let locations = self.nodes.len();
        let connections = self.graph.edge_count();
        let mut low = 0;
        let mut medium = 0;
        let mut high = 0;
        let mut ready = 0;
        for route in self.routes.values() {
            match route.detection_risk {
                r if r < 0.3 => low += 1,
                r if r > 0.6 => high += 1,
                _ => medium += 1,
            }
            if route.is_production_ready() {
                ready += 1;
            }
        }
        GraphStats {
            locations,
            routes: self.routes.len(),
            connections,
            average_degree: if locations == 0 {
                0.0
            } else {
                connections as f64 / locations as f64
            },
            low_risk_routes: low,
            medium_risk_routes: medium,
            high_risk_routes: high,
            production_ready_routes: ready,
        }
    }

    /// Marks a route's selectors as validated against a live page.
    pub fn set_route_validated(&mut self, route_id: &str, validated: bool) -> Result<()> {
        let route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| NavError::InvalidRoute(format!("unknown route '{}'", route_id)))?;
        route.validated = validated;
        Ok(())
    }

    /// Shifts a route's detection risk by `delta`, clamped to [0,1]. This is
    /// the optimizer's feedback hook; construction-time validation still
    /// rejects out-of-range inputs.
    pub fn adjust_route_risk(&mut self, route_id: &str, delta: f64) -> Result<f64> {
        let route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| NavError::InvalidRoute(format!("unknown route '{}'", route_id)))?;
        route.detection_risk = (route.detection_risk + delta).clamp(0.0, 1.0);
        Ok(route.detection_risk)
    }

    fn reconstruct(
        &self,
        prev: &HashMap<NodeIndex, NodeIndex>,
        src: NodeIndex,
        dst: NodeIndex,
    ) -> Vec<String> {
        let mut path = vec![dst];
        let mut cursor = dst;
        while cursor != src {
            cursor = prev[&cursor];
            path.push(cursor);
        }
        path.reverse();
        path.into_iter().map(|i| self.graph[i].clone()).collect()
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let mut locations: Vec<String> = self.nodes.keys().cloned().collect();
        locations.sort();
        let mut routes: Vec<NavigationRoute> = self.routes.values().cloned().collect();
        routes.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        let mut connections: Vec<ConnectionSnapshot> = self
            .graph
            .edge_references()
            .map(|e| ConnectionSnapshot {
                source: self.graph[e.source()].clone(),
                target: self.graph[e.target()].clone(),
                weight: *e.weight(),
            })
            .collect();
        connections.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        GraphSnapshot {
            graph_id: self.graph_id.clone(),
            locations,
            routes,
            connections,
        }
    }

    /// Rebuilds a graph from a snapshot, failing fast on referential
    /// integrity violations instead of silently dropping entries.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let mut graph = RouteGraph::new(snapshot.graph_id);
        for location in &snapshot.locations {
            graph.add_location(location.clone());
        }
        for route in snapshot.routes {
            if !graph.contains_location(&route.source) {
                return Err(NavError::GraphIntegrity(format!(
                    "route '{}' references unknown source '{}'",
                    route.route_id, route.source
                )));
            }
            if !graph.contains_location(&route.destination) {
                return Err(NavError::GraphIntegrity(format!(
                    "route '{}' references unknown destination '{}'",
                    route.route_id, route.destination
                )));
            }
            graph.add_route(route)?;
        }
        for conn in snapshot.connections {
            graph.add_connection(&conn.source, &conn.target, conn.weight)?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RouteType, TraversalMethod};

    fn sample_graph() -> RouteGraph {
        let mut g = RouteGraph::new("test");
        for loc in ["home", "about", "products", "cart", "checkout"] {
            g.add_location(loc);
        }
        g.add_connection("home", "about", 1.0).unwrap();
        g.add_connection("home", "products", 1.2).unwrap();
        g.add_connection("products", "cart", 1.5).unwrap();
        g.add_connection("cart", "checkout", 1.8).unwrap();
        g
    }

    #[test]
    fn test_shortest_path_weights() {
        let g = sample_graph();
        let (path, cost) = g.shortest_path("home", "checkout").unwrap();
        assert_eq!(path, vec!["home", "products", "cart", "checkout"]);
        assert!((cost - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_shortest_path_unreachable() {
        let g = sample_graph();
        assert!(g.shortest_path("about", "checkout").is_none());
        assert!(g.shortest_path("home", "nonexistent").is_none());
    }

    #[test]
    fn test_astar_matches_dijkstra_cost() {
        let g = sample_graph();
        let (_, d_cost) = g.shortest_path("home", "checkout").unwrap();
        let (a_path, a_cost) = g.astar_path("home", "checkout").unwrap();
        assert!((d_cost - a_cost).abs() < 1e-9);
        assert_eq!(a_path.first().map(|s| s.as_str()), Some("home"));
        assert_eq!(a_path.last().map(|s| s.as_str()), Some("checkout"));
    }

    #[test]
    fn test_add_connection_missing_endpoint_does_not_mutate() {
        let mut g = sample_graph();
        let before = g.connection_count();
        assert!(g.add_connection("home", "missing", 1.0).is_err());
        assert!(g.add_connection("missing", "home", 1.0).is_err());
        assert!(g.add_connection("home", "about", 0.0).is_err());
        assert!(g.add_connection("home", "about", -1.0).is_err());
        assert_eq!(g.connection_count(), before);
    }

    #[test]
    fn test_remove_location_cascades() {
        let mut g = sample_graph();
        let route = NavigationRoute::new(
            "r-cart",
            "products",
            "cart",
            RouteType::Link,
            TraversalMethod::Click,
            0.9,
            0.2,
        )
        .unwrap();
        g.add_route(route).unwrap();

        g.remove_location("cart").unwrap();
        assert!(!g.contains_location("cart"));
        assert!(g.route("r-cart").is_none());
        assert!(g.weight_between("products", "cart").is_none());
        assert!(g.shortest_path("home", "checkout").is_none());
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut g = RouteGraph::new("dup");
        let route = NavigationRoute::new(
            "r1",
            "a",
            "b",
            RouteType::Link,
            TraversalMethod::Click,
            0.9,
            0.2,
        )
        .unwrap();
        g.add_route(route.clone()).unwrap();
        assert!(g.add_route(route).is_err());
    }

    #[test]
    fn test_remove_route_keeps_connection_shared_with_another_route() {
        let mut g = RouteGraph::new("shared");
        let link = NavigationRoute::new(
            "home->products",
            "home",
            "products",
            RouteType::Link,
            TraversalMethod::Click,
            0.9,
            0.1,
        )
        .unwrap();
        let api = NavigationRoute::new(
            "home->products-api",
            "home",
            "products",
            RouteType::Api,
            TraversalMethod::ApiCall,
            0.9,
            0.1,
        )
        .unwrap();
        g.add_route(link).unwrap();
        g.add_route(api).unwrap();
        g.add_connection("home", "products", 1.2).unwrap();

        g.remove_route("home->products").unwrap();
        assert_eq!(g.weight_between("home", "products"), Some(1.2));
        assert_eq!(
            g.route_between("home", "products").map(|r| r.route_id.as_str()),
            Some("home->products-api")
        );

        g.remove_route("home->products-api").unwrap();
        assert!(g.weight_between("home", "products").is_none());
        assert!(g.route_between("home", "products").is_none());
    }

    #[test]
    fn test_all_simple_paths_bounded() {
        let mut g = sample_graph();
        g.add_connection("about", "products", 0.5).unwrap();
        let paths = g.all_simple_paths("home", "cart", 10);
        assert_eq!(paths.len(), 2);
        let short = g.all_simple_paths("home", "cart", 3);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0], vec!["home", "products", "cart"]);
    }

    #[test]
    fn test_connected_components() {
        let mut g = sample_graph();
        assert_eq!(g.connected_components(), 1);
        g.add_location("island");
        assert_eq!(g.connected_components(), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut g = sample_graph();
        let route = NavigationRoute::new(
            "r1",
            "home",
            "products",
            RouteType::Link,
            TraversalMethod::Click,
            0.85,
            0.25,
        )
        .unwrap()
        .with_validated(true);
        g.add_route(route).unwrap();

        let snapshot = g.to_snapshot();
        let rebuilt = RouteGraph::from_snapshot(snapshot).unwrap();
        assert_eq!(rebuilt.location_count(), g.location_count());
        assert_eq!(rebuilt.route_count(), 1);
        let (path, cost) = rebuilt.shortest_path("home", "checkout").unwrap();
        assert_eq!(path, vec!["home", "products", "cart", "checkout"]);
        assert!((cost - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_integrity_violation_fails() {
        let snapshot = GraphSnapshot {
            graph_id: "broken".to_string(),
            locations: vec!["a".to_string()],
            routes: Vec::new(),
            connections: vec![ConnectionSnapshot {
                source: "a".to_string(),
                target: "ghost".to_string(),
                weight: 1.0,
            }],
        };
        assert!(matches!(
            RouteGraph::from_snapshot(snapshot),
            Err(NavError::GraphIntegrity(_))
        ));
    }

    #[test]
    fn test_stats_production_ready() {
        let mut g = RouteGraph::new("stats");
        let ready = NavigationRoute::new(
            "ready",
            "a",
            "b",
            RouteType::Link,
            TraversalMethod::Click,
            0.9,
            0.1,
        )
        .unwrap()
        .with_validated(true);
        let risky = NavigationRoute::new(
            "risky",
            "b",
            "c",
            RouteType::JavascriptTriggered,
            TraversalMethod::JsExec,
            0.9,
            0.7,
        )
        .unwrap();
        g.add_route(ready).unwrap();
        g.add_route(risky).unwrap();

        let stats = g.stats();
        assert_eq!(stats.production_ready_routes, 1);
        assert_eq!(stats.low_risk_routes, 1);
        assert_eq!(stats.high_risk_routes, 1);
    }
}
