use colored::Colorize;
use sitewarc::command_argument_builder;
use sitewarc::handlers::{console_level, handle_crawl, handle_report, init_logging, print_banner};

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("report", primary_command)) => {
            init_logging(None, console_level(quiet, false)).and_then(|_| handle_report(primary_command))
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
