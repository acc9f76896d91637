use crate::error::{DiscoveryError, Result};
use crate::result::{DiscoveredForm, FormInput, PageSurvey};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use wayfinder_core::model::InteractionRequirement;
use wayfinder_core::stealth::{CancelFlag, RiskAssessor, RouteMetadata, SelectorEngine};
use wayfinder_core::{
    HeuristicRiskAssessor, HeuristicSelectorEngine, NavigationRoute, RouteGraph, RouteType,
    TraversalMethod,
};

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Surveys plus the navigation routes distilled from them.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub surveys: Vec<PageSurvey>,
    pub routes: Vec<NavigationRoute>,
}

/// Crawls a site and turns what it finds into navigation routes: links
/// become click routes, forms become form-submission routes with their
/// interaction requirements spelled out.
pub struct RouteDiscoverer {
    client: Client,
    visited: Arc<Mutex<HashSet<String>>>,
    surveys: Arc<Mutex<Vec<PageSurvey>>>,
    assessor: Arc<dyn RiskAssessor>,
    selector_engine: Arc<dyn SelectorEngine>,
    max_depth: usize,
    base_domain: Option<String>,
    progress_callback: Option<ProgressCallback>,
    cancel: CancelFlag,
}

impl RouteDiscoverer {
    pub fn new() -> Self {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent("Wayfinder/0.2 (https://github.com/trapdoorsec/wayfinder)")
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(timeout_secs / 2))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();

        Self {
            client,
            visited: Arc::new(Mutex::new(HashSet::new())),
            surveys: Arc::new(Mutex::new(Vec::new())),
            assessor: Arc::new(HeuristicRiskAssessor),
            selector_engine: Arc::new(HeuristicSelectorEngine),
            max_depth: 3,
            base_domain: None,
            progress_callback: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_base_domain(mut self, domain: String) -> Self {
        self.base_domain = Some(domain);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_assessor(mut self, assessor: Arc<dyn RiskAssessor>) -> Self {
        self.assessor = assessor;
        self
    }

    pub fn with_selector_engine(mut self, engine: Arc<dyn SelectorEngine>) -> Self {
        self.selector_engine = engine;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Crawls from `start_url` with the given number of workers and distils
    /// the surveys into routes. Cancellation is checked between fetches.
    pub async fn discover(&self, start_url: &str, workers: usize) -> Result<DiscoveryOutcome> {
        info!("Starting route discovery of {} with {} workers", start_url, workers);

        let parsed_url = Url::parse(start_url)
            .map_err(|e| DiscoveryError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let base_domain = self
            .base_domain
            .clone()
            .or_else(|| parsed_url.host_str().map(|h| h.to_string()))
            .ok_or_else(|| DiscoveryError::InvalidUrl(format!("{} has no host", start_url)))?;

        {
            let mut visited = self.visited.lock().await;
            visited.insert(start_url.to_string());
        }

        // Per-worker queues of (url, depth); new links are distributed
        // round-robin so no single worker starves.
        let worker_queues: Arc<Vec<Mutex<VecDeque<(String, usize)>>>> =
            Arc::new((0..workers).map(|_| Mutex::new(VecDeque::new())).collect());
        {
            let mut queue = worker_queues[0].lock().await;
            queue.push_back((start_url.to_string(), 0));
        }

        let mut worker_handles = Vec::new();
        for worker_id in 0..workers {
            let client = self.client.clone();
            let base_domain = base_domain.clone();
            let progress_cb = self.progress_callback.clone();
            let max_depth = self.max_depth;
            let visited = self.visited.clone();
            let surveys = self.surveys.clone();
            let cancel = self.cancel.clone();
            let worker_queues = worker_queues.clone();

            let handle = tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                let mut empty_iterations = 0;
                const MAX_EMPTY_ITERATIONS: usize = 10;

                loop {
                    if cancel.is_cancelled() {
                        debug!("Worker {} cancelled", worker_id);
                        break;
                    }

                    let work_item = {
                        let mut queue = worker_queues[worker_id].lock().await;
                        queue.pop_front()
                    };

                    let (url, depth) = if let Some(item) = work_item {
                        empty_iterations = 0;
                        item
                    } else {
                        if Self::all_queues_empty(&worker_queues).await {
                            empty_iterations += 1;
                            if empty_iterations >= MAX_EMPTY_ITERATIONS {
                                debug!("Worker {} exiting", worker_id);
                                break;
                            }
                        } else {
                            empty_iterations = 0;
                        }
                        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                        continue;
                    };

                    if depth >= max_depth {
                        continue;
                    }

                    if let Some(ref callback) = progress_cb {
                        callback(worker_id, url.clone());
                    }

                    match Self::survey_page(&client, &url, &base_domain).await {
                        Ok(survey) => {
                            let new_urls = survey.links_found.clone();
                            {
                                let mut surveys_lock = surveys.lock().await;
                                surveys_lock.push(survey);
                            }

                            let mut target_worker = 0;
                            for new_url in new_urls {
                                let should_queue = {
                                    let mut visited_lock = visited.lock().await;
                                    visited_lock.insert(new_url.clone())
                                };
                                if should_queue {
                                    let mut queue = worker_queues[target_worker].lock().await;
                                    queue.push_back((new_url, depth + 1));
                                    drop(queue);
                                    target_worker = (target_worker + 1) % worker_queues.len();
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Survey error for {}: {}", url, e);
                            let mut surveys_lock = surveys.lock().await;
                            surveys_lock.push(PageSurvey::with_error(url, e.to_string()));
                        }
                    }
                }
            });
            worker_handles.push(handle);
        }

        for handle in worker_handles {
            handle.await?;
        }

        if self.cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        let surveys = self.surveys.lock().await.clone();
        let routes = self.routes_from_surveys(&surveys, &base_domain);
        info!(
            "Discovery complete: {} pages surveyed, {} routes",
            surveys.len(),
            routes.len()
        );
        Ok(DiscoveryOutcome { surveys, routes })
    }

    async fn all_queues_empty(worker_queues: &Arc<Vec<Mutex<VecDeque<(String, usize)>>>>) -> bool {
        for queue in worker_queues.iter() {
            if !queue.lock().await.is_empty() {
                return false;
            }
        }
        true
    }

    async fn survey_page(client: &Client, url: &str, base_domain: &str) -> Result<PageSurvey> {
        debug!("Surveying {}", url);

        let start = Instant::now();
        let response = client.get(url).send().await?;
        let response_time = start.elapsed();

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        let mut survey = PageSurvey::new(url.to_string());
        survey.status_code = status_code;
        survey.content_type = content_type.clone();
        survey.response_time = response_time;

        let is_html = content_type
            .as_ref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        if is_html {
            let (links, forms) = Self::extract_elements(&body, url, base_domain)?;
            survey.links_found = links;
            survey.forms_found = forms;
        }

        Ok(survey)
    }

    fn extract_elements(
        html: &str,
        current_url: &str,
        base_domain: &str,
    ) -> Result<(Vec<String>, Vec<DiscoveredForm>)> {
        let document = Html::parse_document(html);

        let link_selector = Selector::parse("a[href]")
            .map_err(|e| DiscoveryError::ParseError(e.to_string()))?;
        let mut links = Vec::new();
        for element in document.select(&link_selector) {
            if let Some(href) = element.value().attr("href")
                && let Some(absolute_url) = Self::resolve_url(current_url, href)
                && Self::is_same_domain(&absolute_url, base_domain)
                && !links.contains(&absolute_url)
            {
                links.push(absolute_url);
            }
        }

        let form_selector =
            Selector::parse("form").map_err(|e| DiscoveryError::ParseError(e.to_string()))?;
        let input_selector = Selector::parse("input[name], select[name], textarea[name]")
            .map_err(|e| DiscoveryError::ParseError(e.to_string()))?;

        let mut forms = Vec::new();
        for (index, form) in document.select(&form_selector).enumerate() {
            // An empty or missing action submits back to the current page.
            let action = Self::resolve_url(current_url, form.value().attr("action").unwrap_or(""))
                .unwrap_or_else(|| current_url.to_string());
            if !Self::is_same_domain(&action, base_domain) {
                continue;
            }

            let method = form
                .value()
                .attr("method")
                .unwrap_or("get")
                .to_lowercase();
            let inputs = form
                .select(&input_selector)
                .filter_map(|input| {
                    let name = input.value().attr("name")?;
                    Some(FormInput {
                        name: name.to_string(),
                        input_type: input.value().attr("type").unwrap_or("text").to_string(),
                        required: input.value().attr("required").is_some(),
                    })
                })
                .collect();
            let selector = match form.value().attr("id") {
                Some(id) => format!("form#{}", id),
                None => format!("form:nth-of-type({})", index + 1),
            };

            forms.push(DiscoveredForm {
                action,
                method,
                inputs,
                selector,
            });
        }

        Ok((links, forms))
    }

    /// Collapses surveys into deduplicated routes. Link targets become click
    /// routes, form actions become form-submission routes carrying one
    /// interaction requirement per named input plus the submit itself.
    fn routes_from_surveys(
        &self,
        surveys: &[PageSurvey],
        base_domain: &str,
    ) -> Vec<NavigationRoute> {
        let mut routes: HashMap<String, NavigationRoute> = HashMap::new();

        for survey in surveys {
            if survey.error.is_some() {
                continue;
            }
            for link in &survey.links_found {
                if link == &survey.url {
                    continue;
                }
                let route_id = format!("{}->{}", survey.url, link);
                if routes.contains_key(&route_id) {
                    continue;
                }
                match self.link_route(&route_id, &survey.url, link, base_domain) {
                    Ok(route) => {
                        routes.insert(route_id, route);
                    }
                    Err(e) => warn!("Skipping link route {}: {}", route_id, e),
                }
            }

            for form in &survey.forms_found {
                let route_id = format!("{}=>{}", survey.url, form.action);
                if routes.contains_key(&route_id) {
                    continue;
                }
                match self.form_route(&route_id, &survey.url, form, base_domain) {
                    Ok(route) => {
                        routes.insert(route_id, route);
                    }
                    Err(e) => warn!("Skipping form route {}: {}", route_id, e),
                }
            }
        }

        let mut routes: Vec<NavigationRoute> = routes.into_values().collect();
        routes.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        routes
    }

    fn link_route(
        &self,
        route_id: &str,
        source: &str,
        target: &str,
        base_domain: &str,
    ) -> wayfinder_core::Result<NavigationRoute> {
        let meta = RouteMetadata {
            url: target.to_string(),
            route_type: RouteType::Link,
            same_site: Self::is_same_domain(target, base_domain),
            has_query_params: target.contains('?'),
        };
        let risk = self.assessor.assess_route_risk(&meta);
        let selectors = self.selector_engine.selectors_for_route(target);
        let confidence = self.selector_engine.validate_route_selectors(&selectors);

        NavigationRoute::new(
            route_id,
            source,
            target,
            RouteType::Link,
            TraversalMethod::Click,
            confidence,
            risk,
        )
    }

    fn form_route(
        &self,
        route_id: &str,
        source: &str,
        form: &DiscoveredForm,
        base_domain: &str,
    ) -> wayfinder_core::Result<NavigationRoute> {
        let meta = RouteMetadata {
            url: form.action.clone(),
            route_type: RouteType::Form,
            same_site: Self::is_same_domain(&form.action, base_domain),
            has_query_params: form.method == "get",
        };
        let risk = self.assessor.assess_route_risk(&meta);
        let selectors = vec![form.selector.clone()];
        let confidence = self.selector_engine.validate_route_selectors(&selectors);

        let mut interactions: Vec<InteractionRequirement> = form
            .inputs
            .iter()
            .map(|input| InteractionRequirement {
                kind: input.input_type.clone(),
                target_selector: format!("{} [name=\"{}\"]", form.selector, input.name),
                required_data: None,
                timing_delay: 0.5,
            })
            .collect();
        interactions.push(InteractionRequirement {
            kind: "submit".to_string(),
            target_selector: form.selector.clone(),
            required_data: None,
            timing_delay: 1.0,
        });

        Ok(NavigationRoute::new(
            route_id,
            source,
            form.action.clone(),
            RouteType::Form,
            TraversalMethod::FormSubmit,
            confidence,
            risk,
        )?
        .with_interactions(interactions))
    }

    fn resolve_url(base: &str, href: &str) -> Option<String> {
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with('#')
        {
            return None;
        }

        let base_url = Url::parse(base).ok()?;
        let mut resolved = base_url.join(href).ok()?;
        resolved.set_fragment(None);
        Some(resolved.to_string())
    }

    fn is_same_domain(url: &str, base_domain: &str) -> bool {
        if let Ok(parsed) = Url::parse(url)
            && let Some(host) = parsed.host_str()
        {
            return host == base_domain || host.ends_with(&format!(".{}", base_domain));
        }
        false
    }

    pub async fn surveyed_count(&self) -> usize {
        self.surveys.lock().await.len()
    }
}

impl Default for RouteDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles discovered routes into a route graph, with each edge weighted
/// by the route's base traversal cost.
pub fn build_graph(graph_id: &str, routes: &[NavigationRoute]) -> wayfinder_core::Result<RouteGraph> {
    let mut graph = RouteGraph::new(graph_id);
    for route in routes {
        graph.add_route(route.clone())?;
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn mount_page(server: &MockServer, page_path: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(html.into_bytes()),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_link_routes_discovered() {
        let server = MockServer::start().await;
        let root = format!(
            r#"<html><body>
                <a href="{0}/products">Products</a>
                <a href="{0}/about">About</a>
                <a href="https://elsewhere.example/out">External</a>
            </body></html>"#,
            server.uri()
        );
        mount_page(&server, "/", root).await;
        mount_page(&server, "/products", "<html><body>P</body></html>".to_string()).await;
        mount_page(&server, "/about", "<html><body>A</body></html>".to_string()).await;

        let discoverer = RouteDiscoverer::new().with_max_depth(2);
        let outcome = discoverer.discover(&server.uri(), 1).await.unwrap();

        assert_eq!(outcome.routes.len(), 2);
        assert!(outcome.routes.iter().all(|r| r.route_type == RouteType::Link));
        assert!(
            outcome
                .routes
                .iter()
                .all(|r| !r.destination.contains("elsewhere"))
        );
    }

    #[tokio::test]
    async fn test_form_route_carries_interactions() {
        let server = MockServer::start().await;
        let root = format!(
            r#"<html><body>
                <form id="login" action="{0}/session" method="post">
                    <input type="text" name="username" required>
                    <input type="password" name="password" required>
                </form>
            </body></html>"#,
            server.uri()
        );
        mount_page(&server, "/", root).await;

        let discoverer = RouteDiscoverer::new().with_max_depth(1);
        let outcome = discoverer.discover(&server.uri(), 1).await.unwrap();

        let form_route = outcome
            .routes
            .iter()
            .find(|r| r.route_type == RouteType::Form)
            .expect("form route missing");
        assert_eq!(form_route.traversal_method, TraversalMethod::FormSubmit);
        // Two inputs plus the submit interaction.
        assert_eq!(form_route.interaction_requirements.len(), 3);
        assert_eq!(form_route.interaction_requirements[0].kind, "text");
        assert_eq!(
            form_route.interaction_requirements.last().unwrap().kind,
            "submit"
        );
        assert!(form_route.detection_risk > 0.1);
    }

    #[tokio::test]
    async fn test_build_graph_from_discovery() {
        let server = MockServer::start().await;
        let root = format!(
            r#"<html><body><a href="{0}/next">Next</a></body></html>"#,
            server.uri()
        );
        mount_page(&server, "/", root).await;
        mount_page(&server, "/next", "<html><body>N</body></html>".to_string()).await;

        let discoverer = RouteDiscoverer::new().with_max_depth(2);
        let outcome = discoverer.discover(&server.uri(), 2).await.unwrap();

        let graph = build_graph("discovered", &outcome.routes).unwrap();
        let stats = graph.stats();
        assert_eq!(stats.routes, outcome.routes.len());
        assert!(stats.locations >= 2);
    }

    #[tokio::test]
    async fn test_cancelled_discovery_errors() {
        let server = MockServer::start().await;
        mount_page(&server, "/", "<html><body>empty</body></html>".to_string()).await;

        let cancel = CancelFlag::new();
        cancel.cancel();
        let discoverer = RouteDiscoverer::new().with_cancel_flag(cancel);

        let err = discoverer.discover(&server.uri(), 1).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Cancelled));
    }

    #[tokio::test]
    async fn test_invalid_start_url() {
        let discoverer = RouteDiscoverer::new();
        let err = discoverer.discover("not a url", 1).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidUrl(_)));
    }
}
