use std::error::Error;
use std::path::PathBuf;
use structopt::StructOpt;

use trailwatch::analysis::run_analysis;
use trailwatch::config::Config;
use trailwatch::input::list_log_files;
use trailwatch::output::{OutputFormat, OutputHandler};
use trailwatch::reputation::{ReputationClient, ReputationDocument};
use trailwatch::tor::{self, ExitNodeClassifier};

/// CloudTrail triage command line interface
#[derive(StructOpt, Debug)]
#[structopt(
    name = "trailwatch",
    about = "CloudTrail log triage with IP reputation and Tor exit-node checks"
)]
pub enum Cli {
    /// Analyze a directory of CloudTrail logs and look up the most active source IPs
    Analyze {
        /// Path to configuration file
        #[structopt(short, long, default_value = "trailwatch.toml")]
        config: PathBuf,
        /// Directory of CloudTrail log files
        #[structopt(short, long)]
        dir: Option<PathBuf>,
        /// Report format: console, json, or jsonl
        #[structopt(short, long)]
        format: Option<String>,
        /// Number of most frequently seen IPs to look up
        #[structopt(short = "n", long)]
        top_n: Option<usize>,
    },
    /// Check whether IP addresses are current Tor exit nodes
    TorCheck {
        /// Path to configuration file
        #[structopt(short, long, default_value = "trailwatch.toml")]
        config: PathBuf,
        /// Single IP address to check
        #[structopt(long)]
        ip: Option<String>,
        /// File containing a list of IPs, one per line
        #[structopt(long)]
        ip_list: Option<PathBuf>,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "trailwatch.toml")]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    match Cli::from_args() {
        Cli::Analyze {
            config,
            dir,
            format,
            top_n,
        } => {
            let mut config = Config::load_or_default(&config)?;
            if let Some(dir) = dir {
                config.input.log_dir = dir;
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            if let Some(top_n) = top_n {
                config.reputation.top_n = top_n;
            }
            analyze(&config).await?;
        }
        Cli::TorCheck { config, ip, ip_list } => {
            let config = Config::load_or_default(&config)?;
            tor_check(&config, ip, ip_list).await?;
        }
        Cli::Config { output } => {
            Config::default().to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
    }

    Ok(())
}

async fn analyze(config: &Config) -> Result<(), Box<dyn Error>> {
    let log_dir = &config.input.log_dir;
    if !log_dir.is_dir() {
        eprintln!("Log directory not found: {:?}", log_dir);
        std::process::exit(1);
    }

    let files = list_log_files(log_dir, &config.input.file_extension)?;
    if files.is_empty() {
        log::warn!(
            "No .{} files found in {:?}",
            config.input.file_extension,
            log_dir
        );
    }

    let mut output = OutputHandler::new(
        OutputFormat::from_str(&config.output.format),
        config.output.file_path.clone(),
    )?;
    let summary = run_analysis(&files, &mut output)?;

    let top_ips = summary.ip_counter.most_common(config.reputation.top_n);
    let api_key = match config.reputation.resolve_api_key() {
        Some(key) => key,
        None => {
            log::warn!(
                "No AbuseIPDB API key configured (set {} or reputation.api_key); skipping reputation lookups for {} IPs",
                trailwatch::config::API_KEY_ENV,
                top_ips.len()
            );
            ReputationDocument::default().write_to_file(&config.reputation.output_path)?;
            return Ok(());
        }
    };

    log::info!("Looking up reputation for the top {} source IPs", top_ips.len());
    let client = ReputationClient::new(&config.reputation, api_key)?;
    let document = client.enrich(&top_ips).await;
    document.write_to_file(&config.reputation.output_path)?;

    println!(
        "\nIP reputation check completed. Results saved to '{}'.",
        config.reputation.output_path.display()
    );
    Ok(())
}

async fn tor_check(
    config: &Config,
    ip: Option<String>,
    ip_list: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    match (ip, ip_list) {
        (Some(ip), None) => {
            let mut classifier = ExitNodeClassifier::new(&config.tor)?;
            let is_exit = classifier.is_exit_node(&ip).await;
            println!("{} is a Tor exit node: {}", ip, is_exit);
        }
        (None, Some(list)) => {
            if !list.is_file() {
                eprintln!("Error: File not found: {}", list.display());
                return Ok(());
            }

            let ips = tor::read_ip_list(&list)?;
            let mut classifier = ExitNodeClassifier::new(&config.tor)?;
            let checks = classifier.check_batch(ips).await;

            let results_path = tor::next_available_path(&config.tor.results_path);
            tor::write_results_csv(&results_path, &checks)?;
            println!("Results written to {}", results_path.display());
        }
        _ => println!("Please provide either --ip or --ip-list argument."),
    }

    Ok(())
}
