use commands::command_argument_builder;
use wayfinder::handlers::{handle_discover, handle_plan, handle_simulate, print_banner};

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    match chosen_command.subcommand() {
        Some(("discover", primary_command)) => handle_discover(primary_command).await,
        Some(("plan", primary_command)) => handle_plan(primary_command),
        Some(("simulate", primary_command)) => handle_simulate(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
