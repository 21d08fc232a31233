use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tdship_core::ImageTag;
use tdship_core::app::{DeployReport, Deployer, retag_file};
use tdship_core::config::{DEFAULT_CONFIG_PATH, DeployConfig};
use tdship_core::impls::AwsCliPlatform;
use tdship_core::ports::SystemClock;

#[derive(Debug, Parser)]
#[command(name = "tdship", version, about = "Retag and redeploy ECS task definitions")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rewrite a task definition JSON file with a new image tag.
    Retag(RetagArgs),

    /// Register a retagged task definition for each service and roll the service onto it.
    Deploy(DeployArgs),
}

#[derive(Debug, Args)]
struct RetagArgs {
    /// `describe-task-definition` output, or a file written by a previous retag.
    file: PathBuf,

    /// New image tag for every container.
    tag: ImageTag,

    /// Write the result here instead of overwriting FILE.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DeployArgs {
    /// Deploy config file [default: tdship.toml, if present].
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Tag for every service, overriding the config.
    #[arg(long)]
    tag: Option<ImageTag>,

    /// Service to deploy (repeatable). Replaces the services from the config.
    #[arg(long = "service", value_name = "NAME")]
    services: Vec<String>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    profile: Option<String>,

    /// Path of the aws CLI binary.
    #[arg(long, value_name = "PATH")]
    aws_bin: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Retag(args) => retag(args),
        Command::Deploy(args) => deploy(args).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn retag(args: RetagArgs) -> anyhow::Result<ExitCode> {
    let output = args.output.as_deref().unwrap_or(&args.file);
    let definition = retag_file(&args.file, output, &args.tag)?;

    println!(
        "{}: {} container image(s) of {} retagged to {}",
        output.display(),
        definition.container_definitions.len(),
        definition.family,
        args.tag
    );
    Ok(ExitCode::SUCCESS)
}

async fn deploy(args: DeployArgs) -> anyhow::Result<ExitCode> {
    let config = apply_overrides(load_config(args.config.as_deref())?, &args);
    tracing::debug!(services = config.services.len(), aws = ?config.aws, "deploy config loaded");
    let targets = config.targets(args.tag.as_ref(), &SystemClock).context(
        "nothing to deploy: add [[services]] to the config or pass --service",
    )?;

    let deployer = Deployer::new(AwsCliPlatform::new(config.aws));
    let report = deployer.deploy_all(&targets).await;
    print_summary(&report);

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// An explicit `--config` must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> anyhow::Result<DeployConfig> {
    match path {
        Some(path) => Ok(DeployConfig::load(path)?),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Ok(DeployConfig::load(default)?)
            } else {
                tracing::debug!(path = DEFAULT_CONFIG_PATH, "no config file, using defaults");
                Ok(DeployConfig::default())
            }
        }
    }
}

fn apply_overrides(mut config: DeployConfig, args: &DeployArgs) -> DeployConfig {
    if !args.services.is_empty() {
        config = config.with_services(args.services.iter().cloned());
    }
    if let Some(region) = &args.region {
        config.aws.region = Some(region.clone());
    }
    if let Some(profile) = &args.profile {
        config.aws.profile = Some(profile.clone());
    }
    if let Some(bin) = &args.aws_bin {
        config.aws.bin = Some(bin.clone());
    }
    config
}

fn print_summary(report: &DeployReport) {
    println!("{}:", report.run_id);
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(arn) => println!("  {}: deployed {arn}", outcome.target.service),
            Err(err) => println!("  {}: FAILED {err}", outcome.target.service),
        }
    }
    let failed = report.failed().count();
    println!(
        "{} succeeded, {failed} failed",
        report.outcomes.len() - failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn deploy_args(argv: &[&str]) -> DeployArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Deploy(args) => args,
            other => panic!("expected deploy, got {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn retag_takes_file_and_tag() {
        let cli = Cli::try_parse_from(["tdship", "retag", "td.json", "202601151258"]).unwrap();
        match cli.command {
            Command::Retag(args) => {
                assert_eq!(args.file, PathBuf::from("td.json"));
                assert_eq!(args.tag.as_str(), "202601151258");
                assert_eq!(args.output, None);
            }
            other => panic!("expected retag, got {other:?}"),
        }
    }

    #[test]
    fn retag_rejects_empty_tag() {
        assert!(Cli::try_parse_from(["tdship", "retag", "td.json", ""]).is_err());
    }

    #[test]
    fn deploy_needs_no_arguments() {
        let args = deploy_args(&["tdship", "deploy"]);
        assert!(args.services.is_empty());
        assert!(args.tag.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["tdship", "deploy", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn overrides_replace_services_and_aws_settings() {
        let args = deploy_args(&[
            "tdship",
            "deploy",
            "--service",
            "svc-a",
            "--service",
            "svc-b",
            "--region",
            "eu-west-1",
            "--aws-bin",
            "/opt/aws/bin/aws",
        ]);
        let config = DeployConfig::parse(
            "[aws]\nprofile = \"deploy\"\n\n[[services]]\nname = \"configured\"\n",
        )
        .unwrap();

        let config = apply_overrides(config, &args);

        let names: Vec<&str> = config.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["svc-a", "svc-b"]);
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.aws.profile.as_deref(), Some("deploy"));
        assert_eq!(config.aws.bin, Some(PathBuf::from("/opt/aws/bin/aws")));
    }

    #[test]
    fn without_overrides_config_is_unchanged() {
        let args = deploy_args(&["tdship", "deploy"]);
        let config = DeployConfig::parse("[[services]]\nname = \"configured\"\n").unwrap();

        assert_eq!(apply_overrides(config.clone(), &args), config);
    }
}
