use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitewarc")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitewarc")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and non-essential output")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a single site from a seed URL and archive every response as WARC, \
                with a CDX index alongside.",
                )
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("The seed URL. http:// is assumed when no scheme is given"),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Directory for the .warc.gz, .cdx and .log files")
                        .default_value("./archive"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum link depth from the seed (0 = unlimited)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"delay" <SECONDS>)
                        .required(false)
                        .help("Pause between requests, in seconds")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("1.0"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("30"),
                )
                .arg(
                    arg!(--"allow-domain" <HOST>)
                        .required(false)
                        .help("Host the crawl may visit; repeatable (default: the seed's host)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-v --"verbose")
                        .required(false)
                        .help("Log every crawled URL to the console instead of showing a spinner")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("report")
                .about(
                    "Summarize a crawl from a metadata JSON document or a .cdx index written by \
                a crawl.",
                )
                .arg(
                    arg!(<FILE>)
                        .required(true)
                        .help("Crawl metadata JSON or .cdx index")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"json" <PATH>)
                        .required(false)
                        .help("Also save the raw analysis as JSON to this file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
