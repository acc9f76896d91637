use wayfinder::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("wayfinder")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("wayfinder")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("discover")
                .about("Crawl a site, distil its links and forms into routes and save the graph")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The URL to start discovery from")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async worker 'threads' in the worker pool.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum crawl depth from the start URL")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Where to save the route graph")
                        .default_value("~/.config/wayfinder/graph.json"),
                ),
        )
        .subcommand(
            command!("plan")
                .about("Plan a path between two locations in a saved route graph")
                .arg(
                    arg!(-g --"graph" <PATH>)
                        .required(true)
                        .help("Path to a saved route graph"),
                )
                .arg(
                    arg!(--"from" <LOCATION>)
                        .required(true)
                        .help("Starting location"),
                )
                .arg(
                    arg!(--"to" <LOCATION>)
                        .required(true)
                        .help("Target destination"),
                )
                .arg(
                    arg!(-r --"risk-tolerance" <SCORE>)
                        .required(false)
                        .help("Acceptable plan risk, 0.0 to 1.0")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.5"),
                )
                .arg(
                    arg!(-a --"alternatives" "Also print alternative plans")
                        .required(false)
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the primary plan to file instead of printing it"),
                ),
        )
        .subcommand(
            command!("simulate")
                .about("Walk a planned path against a simulated executor and report the outcome")
                .arg(
                    arg!(-g --"graph" <PATH>)
                        .required(true)
                        .help("Path to a saved route graph"),
                )
                .arg(
                    arg!(--"from" <LOCATION>)
                        .required(true)
                        .help("Starting location"),
                )
                .arg(
                    arg!(--"to" <LOCATION>)
                        .required(true)
                        .help("Target destination"),
                )
                .arg(
                    arg!(-r --"risk-tolerance" <SCORE>)
                        .required(false)
                        .help("Acceptable plan risk, 0.0 to 1.0")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.5"),
                )
                .arg(
                    arg!(--"fail-route" <ROUTE_ID>)
                        .required(false)
                        .help("Route id to fail during the walk, to exercise adaptation"),
                )
                .arg(
                    arg!(--"history" <PATH>)
                        .required(false)
                        .help("SQLite file to record the session in"),
                ),
        )
}
