use anyhow::{anyhow, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::net::IpAddr;
use std::path::Path;
use std::process;

use bannerscan::{
    config::EngineConfig,
    output::{OutputFormat, OutputWriter, ScanRecord},
    utils::Logger,
    ScanEngine, ScanOutcome, ScanTarget,
};

fn build_cli() -> Command {
    Command::new("bannerscan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Grab and classify service banners from a single target")
        .arg(
            Arg::new("protocol")
                .value_name("PROTOCOL")
                .help("Protocol to probe (see --list-protocols)")
                .required_unless_present("list-protocols")
                .index(1),
        )
        .arg(
            Arg::new("host")
                .value_name("HOST")
                .help("Target IP address or hostname")
                .required_unless_present("list-protocols")
                .index(2),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to connect to (defaults to the protocol's port)")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("tls")
                .long("tls")
                .help("Wrap the connection in TLS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("server-name")
                .long("server-name")
                .value_name("NAME")
                .help("Hostname to send via SNI"),
        )
        .arg(
            Arg::new("connect-timeout")
                .long("connect-timeout")
                .value_name("MS")
                .help("Connect timeout in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Overall scan budget in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("max-frame")
                .long("max-frame")
                .value_name("BYTES")
                .help("Read buffer size for one frame")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML config file (default: ~/.bannerscan.toml)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Output format: json or text")
                .default_value("json"),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (repeatable)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("list-protocols")
                .long("list-protocols")
                .help("List registered protocols and exit")
                .action(ArgAction::SetTrue),
        )
}

/// Process exit status for a scan outcome
fn exit_code(outcome: ScanOutcome) -> i32 {
    match outcome {
        ScanOutcome::Success => 0,
        ScanOutcome::UnknownError => 1,
        ScanOutcome::ApplicationError => 2,
        ScanOutcome::DialError => 3,
        ScanOutcome::Timeout => 4,
        ScanOutcome::ProtocolError => 5,
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<EngineConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::from_toml_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => EngineConfig::load_default_config(),
    };

    if let Some(timeout) = matches.get_one::<u64>("connect-timeout") {
        config = config.with_connect_timeout(*timeout);
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config = config.with_scan_timeout(*timeout);
    }
    if let Some(size) = matches.get_one::<usize>("max-frame") {
        config = config.with_max_frame_size(*size);
    }

    config.validate()?;
    Ok(config)
}

async fn resolve(host: &str, port: u16) -> anyhow::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {}", host))?;
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| anyhow!("{} did not resolve to any address", host))
}

async fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    let config = load_config(matches)?;
    let registry = config.registry()?;

    if matches.get_flag("list-protocols") {
        for name in registry.protocols() {
            let definition = registry.lookup(name)?;
            println!("{:<12} {:>5}  {}", name.bold(), definition.default_port, definition.description);
        }
        return Ok(0);
    }

    let protocol = matches
        .get_one::<String>("protocol")
        .ok_or_else(|| anyhow!("PROTOCOL is required"))?;
    let host = matches
        .get_one::<String>("host")
        .ok_or_else(|| anyhow!("HOST is required"))?;

    let mut definition = registry.lookup(protocol)?.clone();
    if let Some(size) = matches.get_one::<usize>("max-frame") {
        definition = definition.with_max_frame_size(*size);
    }

    let port = matches
        .get_one::<u16>("port")
        .copied()
        .unwrap_or(definition.default_port);
    let ip = resolve(host, port).await?;

    let tls = matches.get_flag("tls");
    let mut target = ScanTarget::new(ip, port).with_tls(tls);
    match matches.get_one::<String>("server-name") {
        Some(name) => target = target.with_server_name(name.clone()),
        None if tls && host.parse::<IpAddr>().is_err() => target = target.with_server_name(host.clone()),
        None => {}
    }

    let format: OutputFormat = matches
        .get_one::<String>("format")
        .map(|f| f.parse::<OutputFormat>())
        .transpose()
        .map_err(|e: String| anyhow!(e))?
        .unwrap_or(OutputFormat::Json);

    log::info!("Probing {} on {} as {}", host, target.socket_addr(), definition.protocol);

    let engine = ScanEngine::new(config.connect_timeout_duration());
    let report = engine
        .scan_within(&target, &definition, config.scan_timeout_duration())
        .await;

    let record = ScanRecord::from_report(&target, &definition.protocol, &report);
    OutputWriter::new(format)
        .with_colors(!matches.get_flag("no-color"))
        .write_stdout(&record)?;

    Ok(exit_code(report.outcome))
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    Logger::init(Logger::level_from_verbosity(matches.get_count("verbose")));

    match run(&matches).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "[!] ERROR:".bright_red(), e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let outcomes = [
            ScanOutcome::Success,
            ScanOutcome::UnknownError,
            ScanOutcome::ApplicationError,
            ScanOutcome::DialError,
            ScanOutcome::Timeout,
            ScanOutcome::ProtocolError,
        ];
        let mut codes: Vec<i32> = outcomes.iter().map(|o| exit_code(*o)).collect();
        codes.sort_unstable();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_list_protocols_needs_no_target() {
        let matches = build_cli().try_get_matches_from(["bannerscan", "--list-protocols"]).unwrap();
        assert!(matches.get_flag("list-protocols"));

        assert!(build_cli().try_get_matches_from(["bannerscan", "rmiregistry"]).is_err());
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        assert_eq!(resolve("127.0.0.1", 1099).await.unwrap(), "127.0.0.1".parse::<IpAddr>().unwrap());
    }
}
