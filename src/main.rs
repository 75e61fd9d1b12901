use anyhow::Result;
use clap::{Parser, Subcommand};
use depaudit::{
    audit::FileAudit,
    cache::Cache,
    config::{Config, FailBehavior},
    output::{format_results_to_string, print_results, OutputFormat},
    Auditor, NpmRegistry, OsvChecker,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNERABLE: u8 = 2;
}

#[derive(Parser)]
#[command(name = "depaudit")]
#[command(
    author,
    version,
    about = "Audit package.json dependency trees for known vulnerabilities"
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one or more package.json files
    Audit {
        /// Manifests to audit (default: ./package.json)
        files: Vec<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Whether findings fail the run or only warn
        #[arg(long, value_enum)]
        fail_behavior: Option<FailBehavior>,

        /// Write JSON results to file
        #[arg(short, long)]
        output: Option<String>,

        /// Don't read or write the registry cache
        #[arg(long)]
        no_cache: bool,

        /// Deadline in seconds for each registry or advisory request
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the registry cache
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable config file: {}", e);
        Config::default()
    });

    match cli.command {
        Commands::Audit {
            files,
            format,
            fail_behavior,
            output,
            no_cache,
            timeout,
        } => {
            let mut config = config;
            if no_cache {
                config.use_cache = false;
            }
            if let Some(secs) = timeout {
                config.request_timeout_secs = secs;
            }
            if fail_behavior.is_some() {
                config.fail_behavior = fail_behavior;
            }

            let format_str = format.unwrap_or_else(|| config.default_format.clone());
            let files = config.manifest_files(files);

            run_audit(&config, files, &format_str, output).await
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            Cache::new().clear()?;
            println!("Cache cleared.");
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_audit(
    config: &Config,
    files: Vec<PathBuf>,
    format: &str,
    output_file: Option<String>,
) -> Result<u8> {
    let format = OutputFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table;

    let mut registry = NpmRegistry::new(&config.registry_url)?;
    if config.use_cache {
        registry = registry.with_cache(Cache::with_ttl_hours(config.cache_ttl_hours));
    }
    let checker = OsvChecker::with_url(&config.advisory_url);
    let auditor = Auditor::new(Arc::new(registry), Arc::new(checker))
        .with_options(config.audit_options());

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!(
            "Checking {} package file(s) for known vulnerabilities...",
            files.len()
        ));
        Some(pb)
    } else {
        None
    };

    let mut audits = auditor.audit_files(&files).await;
    for audit in &mut audits {
        if let Ok(report) = &mut audit.outcome {
            config.ignore.apply(report);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if let Some(path) = output_file {
        std::fs::write(&path, format_results_to_string(&audits)?)?;
        if is_interactive {
            println!("Results written to: {}", path);
        }
    } else {
        print_results(&audits, format)?;
    }

    let behavior = FailBehavior::resolve(config.fail_behavior, files.len());
    Ok(determine_exit_code(&audits, behavior))
}

/// Load errors always fail the run; findings fail it only under
/// [`FailBehavior::Fail`].
fn determine_exit_code(audits: &[FileAudit], behavior: FailBehavior) -> u8 {
    if audits.iter().any(|a| a.outcome.is_err()) {
        return exit_codes::ERROR;
    }

    let vulnerable = audits
        .iter()
        .filter_map(|a| a.outcome.as_ref().ok())
        .any(|report| !report.is_clean());

    if !vulnerable {
        return exit_codes::SUCCESS;
    }

    match behavior {
        FailBehavior::Fail => {
            eprintln!("Error: audit failed, vulnerabilities found");
            exit_codes::VULNERABLE
        }
        FailBehavior::Warn => {
            eprintln!("Warning: vulnerabilities found, not failing (fail behavior is warn)");
            exit_codes::SUCCESS
        }
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'depaudit config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use depaudit::{error::AuditError, Advisory, AuditReport, Finding};

    fn report(findings: usize) -> FileAudit {
        let finding = Finding {
            name: "lodash".to_string(),
            version: "4.17.15".to_string(),
            advisory: Advisory {
                id: "GHSA-p6mc-m468-83gw".to_string(),
                title: None,
                patched_versions: ">=4.17.19".to_string(),
                url: "https://osv.dev/vulnerability/GHSA-p6mc-m468-83gw".to_string(),
                short_url: None,
            },
            dependency_of: Vec::new(),
        };
        FileAudit {
            file: PathBuf::from("package.json"),
            outcome: Ok(AuditReport::new(
                "package.json",
                "app",
                vec![finding; findings],
            )),
        }
    }

    #[test]
    fn test_clean_run_succeeds() {
        assert_eq!(
            determine_exit_code(&[report(0)], FailBehavior::Fail),
            exit_codes::SUCCESS
        );
    }

    #[test]
    fn test_findings_fail_or_warn() {
        assert_eq!(
            determine_exit_code(&[report(2)], FailBehavior::Fail),
            exit_codes::VULNERABLE
        );
        assert_eq!(
            determine_exit_code(&[report(2)], FailBehavior::Warn),
            exit_codes::SUCCESS
        );
    }

    #[test]
    fn test_load_error_is_distinct_from_clean() {
        let missing = FileAudit {
            file: PathBuf::from("nope/package.json"),
            outcome: Err(AuditError::ManifestNotFound {
                path: PathBuf::from("nope/package.json"),
            }),
        };
        assert_eq!(
            determine_exit_code(&[report(0), missing], FailBehavior::Warn),
            exit_codes::ERROR
        );
    }

    #[test]
    fn test_cli_parses_audit_flags() {
        let cli = Cli::try_parse_from([
            "depaudit",
            "audit",
            "a/package.json",
            "b/package.json",
            "--fail-behavior",
            "warn",
            "--timeout",
            "5",
        ])
        .unwrap();

        match cli.command {
            Commands::Audit {
                files,
                fail_behavior,
                timeout,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(fail_behavior, Some(FailBehavior::Warn));
                assert_eq!(timeout, Some(5));
            }
            _ => panic!("expected audit command"),
        }
    }
}
