use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("catalink")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("catalink")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Raise log verbosity (repeat for trace)")
                .required(false)
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("run")
                .about(
                    "Run the crawler as a service: crawl submitted endpoints and resubmit them \
                every crawling interval. Ctrl-C stops, SIGHUP reloads the config file.",
                )
                .arg(config_arg())
                .arg(whitelist_arg())
                .arg(endpoint_arg().conflicts_with("hosts-file"))
                .arg(hosts_file_arg().conflicts_with("endpoint")),
        )
        .subcommand(
            command!("crawl")
                .about("Run a single crawl pass over the given endpoints and print a report")
                .arg(config_arg())
                .arg(whitelist_arg())
                .arg(
                    endpoint_arg()
                        .conflicts_with("hosts-file")
                        .required_unless_present("hosts-file"),
                )
                .arg(hosts_file_arg().conflicts_with("endpoint"))
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}

fn config_arg() -> clap::Arg {
    arg!(-c --"config" <PATH>)
        .required(false)
        .help("Path to the KEY=\"value\" config file")
        .default_value("./config.ini")
}

fn whitelist_arg() -> clap::Arg {
    arg!(-w --"whitelist" <PATH>)
        .required(false)
        .help("Newline-delimited list of domains that may be followed (overrides WHITELIST_PATH)")
}

fn endpoint_arg() -> clap::Arg {
    arg!(-e --"endpoint" <URL>)
        .required(false)
        .help("A catalog SPARQL endpoint to crawl; may be repeated")
        .value_parser(clap::value_parser!(Url))
        .action(clap::ArgAction::Append)
}

fn hosts_file_arg() -> clap::Arg {
    arg!(-H --"hosts-file" <PATH>)
        .required(false)
        .help("Path to a newline-delimited file of endpoints to crawl")
        .value_parser(clap::value_parser!(PathBuf))
}
