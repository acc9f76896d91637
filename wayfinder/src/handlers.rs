use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wayfinder_core::history::HistoryStore;
use wayfinder_core::store;
use wayfinder_core::{
    EventOutcome, HeuristicRiskAssessor, NavigationReport, NavigationService, PathPlan,
    PathPlanner, ServiceConfig, SimulatedExecutor,
};
use wayfinder_discovery::{RouteDiscoverer, build_graph};

pub fn print_banner() {
    println!(
        "{}",
        r#"
                        ___ _         _
 _ _ _ ___ _ _ ___ ___|  _|_|___ ___| |___ ___
| | | | .'| | |  _| . |  _| |   | . | | -_|  _|
|_____|__,|_  |_| |___|_| |_|_|_|___|_|___|_|
          |___|
"#
        .bright_cyan()
    );
    println!(
        "  {} {}\n",
        "wayfinder".bright_white().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Expands `~` and returns an owned path.
pub fn resolve_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Human-readable lines describing a plan, one per step plus a header.
pub fn plan_summary_lines(plan: &PathPlan) -> Vec<String> {
    let mut lines = vec![format!(
        "{} -> {}  ({} steps, ~{:.1}s, risk {:.2})",
        plan.source_context,
        plan.target_destination,
        plan.route_sequence.len(),
        plan.estimated_duration,
        plan.total_risk_score,
    )];
    for step in &plan.route_sequence {
        lines.push(format!(
            "  {}. {} {} ({:.1}s)",
            step.step_number,
            step.action_type.as_str(),
            step.target_url,
            step.expected_delay,
        ));
    }
    lines
}

/// Human-readable lines describing a finished session.
pub fn report_summary_lines(report: &NavigationReport) -> Vec<String> {
    let failures = report
        .events
        .iter()
        .filter(|e| e.outcome != EventOutcome::Success)
        .count();
    vec![
        format!("session:     {}", report.session_id),
        format!("status:      {}", report.status.as_str()),
        format!("steps:       {}", report.steps_executed),
        format!("failures:    {}", failures),
        format!("retries:     {}", report.retries),
        format!("adaptations: {}", report.adaptations),
    ]
}

pub async fn handle_discover(args: &ArgMatches) {
    tracing_subscriber::fmt::init();

    let url = args.get_one::<Url>("url").cloned();
    let Some(url) = url else {
        eprintln!("{} --url is required", "✗".red().bold());
        std::process::exit(1);
    };
    let threads = *args.get_one::<usize>("threads").unwrap_or(&4);
    let max_depth = *args.get_one::<usize>("max-depth").unwrap_or(&3);
    let output = resolve_path(
        args.get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("~/.config/wayfinder/graph.json"),
    );

    print_divider();
    println!("{}", "  ROUTE DISCOVERY".bright_white().bold());
    print_divider();
    println!("{} Start URL: {}", "→".blue(), url);
    println!("{} Workers: {}  Max depth: {}", "→".blue(), threads, max_depth);
    println!();

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    let spinner_for_progress = spinner.clone();
    let discoverer = RouteDiscoverer::new()
        .with_max_depth(max_depth)
        .with_progress_callback(Arc::new(move |worker_id, url| {
            spinner_for_progress.set_message(format!("worker {}: {}", worker_id, url));
        }));

    match discoverer.discover(url.as_str(), threads).await {
        Ok(outcome) => {
            spinner.finish_and_clear();
            println!("{} Discovery complete!", "✓".green().bold());
            println!("  Pages surveyed: {}", outcome.surveys.len());
            println!("  Routes found:   {}", outcome.routes.len());

            let graph_id = url.host_str().unwrap_or("site");
            match build_graph(graph_id, &outcome.routes) {
                Ok(graph) => {
                    let stats = graph.stats();
                    println!(
                        "  Graph: {} locations, {} connections",
                        stats.locations, stats.connections
                    );
                    if let Err(e) = store::save_graph(&graph, &output) {
                        eprintln!("{} Failed to save graph: {}", "✗".red().bold(), e);
                        std::process::exit(1);
                    }
                    println!("{} Graph saved to {}", "✓".green().bold(), output.display());
                }
                Err(e) => {
                    eprintln!("{} Failed to build graph: {}", "✗".red().bold(), e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("{} Discovery failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}

pub fn handle_plan(args: &ArgMatches) {
    tracing_subscriber::fmt::init();

    let graph_path = resolve_path(args.get_one::<String>("graph").map(String::as_str).unwrap_or(""));
    let from = args.get_one::<String>("from").cloned().unwrap_or_default();
    let to = args.get_one::<String>("to").cloned().unwrap_or_default();
    let risk_tolerance = *args.get_one::<f64>("risk-tolerance").unwrap_or(&0.5);
    let with_alternatives = args.get_flag("alternatives");
    let output = args.get_one::<String>("output").map(|s| resolve_path(s));

    let graph = match store::load_graph(&graph_path) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("{} Failed to load graph: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let planner = PathPlanner::new(Arc::new(HeuristicRiskAssessor));
    if with_alternatives {
        match planner.plan_with_alternatives(&graph, &from, &to, risk_tolerance) {
            Ok(planned) => {
                print_divider();
                println!("{}", "  PRIMARY PLAN".bright_white().bold());
                for line in plan_summary_lines(&planned.primary) {
                    println!("{}", line);
                }
                for (i, alt) in planned.alternatives.iter().enumerate() {
                    println!();
                    println!("{}", format!("  ALTERNATIVE {}", i + 1).bright_white().bold());
                    for line in plan_summary_lines(alt) {
                        println!("{}", line);
                    }
                }
                if let Some(path) = output
                    && let Err(e) = store::save_plan(&planned.primary, &path)
                {
                    eprintln!("{} Failed to save plan: {}", "✗".red().bold(), e);
                    std::process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("{} Planning failed: {}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        }
    } else {
        match planner.plan(&graph, &from, &to, risk_tolerance) {
            Ok(plan) => {
                for line in plan_summary_lines(&plan) {
                    println!("{}", line);
                }
                if let Some(path) = output {
                    if let Err(e) = store::save_plan(&plan, &path) {
                        eprintln!("{} Failed to save plan: {}", "✗".red().bold(), e);
                        std::process::exit(1);
                    }
                    println!("{} Plan saved to {}", "✓".green().bold(), path.display());
                }
            }
            Err(e) => {
                eprintln!("{} Planning failed: {}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        }
    }
}

pub async fn handle_simulate(args: &ArgMatches) {
    tracing_subscriber::fmt::init();

    let graph_path = resolve_path(args.get_one::<String>("graph").map(String::as_str).unwrap_or(""));
    let from = args.get_one::<String>("from").cloned().unwrap_or_default();
    let to = args.get_one::<String>("to").cloned().unwrap_or_default();
    let risk_tolerance = *args.get_one::<f64>("risk-tolerance").unwrap_or(&0.5);
    let fail_route = args.get_one::<String>("fail-route");
    let history_path = args.get_one::<String>("history").map(|s| resolve_path(s));

    let graph = match store::load_graph(&graph_path) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("{} Failed to load graph: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let executor = Arc::new(SimulatedExecutor::new());
    if let Some(route_id) = fail_route {
        executor.fail_route(route_id.clone(), "blocked", u32::MAX);
        println!("{} Scripted permanent failure on '{}'", "→".blue(), route_id);
    }

    let mut service = NavigationService::new(
        graph,
        Arc::new(HeuristicRiskAssessor),
        executor,
        ServiceConfig {
            pace_steps: false,
            risk_tolerance,
            ..ServiceConfig::default()
        },
    );
    if let Some(path) = history_path {
        match HistoryStore::open(&path) {
            Ok(history) => service = service.with_history(history),
            Err(e) => {
                eprintln!("{} Failed to open history store: {}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        }
    }

    match service.navigate(&from, &to).await {
        Ok(report) => {
            print_divider();
            println!("{}", "  SIMULATION REPORT".bright_white().bold());
            print_divider();
            for line in report_summary_lines(&report) {
                println!("  {}", line);
            }
            let marker = if report.completed() {
                "✓".green().bold()
            } else {
                "✗".red().bold()
            };
            println!("\n{} Simulation {}", marker, report.status.as_str());
        }
        Err(e) => {
            eprintln!("{} Simulation failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
