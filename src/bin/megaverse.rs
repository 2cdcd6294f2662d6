//! Command-line entry point for the megaverse client.

use std::process::ExitCode;

use megaverse_client::observability::{init_tracing, LogFormat, LogLevel};
use megaverse_client::{
    AggregateResult, CancellationToken, MegaverseClient, MegaverseConfig, MegaverseError,
    MegaverseResult, PlanGenerator,
};

const USAGE: &str = "\
Usage: megaverse [--json-logs] [--log-level <level>] <command>

Commands:
  phase1                       Draw the Polyanet cross
  phase2                       Draw the logo from the goal map
  status                       Show configuration and goal map size
  clear [--width N] [--height N]
                               Remove every object from the grid
  validate [phase1|phase2]     Compare the current map with a plan

Environment:
  CROSSMINT_CANDIDATE_ID       Candidate id (required)
  CROSSMINT_API_URL            API base URL
  CROSSMINT_REQUESTS_PER_SECOND, CROSSMINT_MAX_ATTEMPTS,
  CROSSMINT_MAX_WORKERS, CROSSMINT_BATCH_SIZE, CROSSMINT_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    One,
    Two,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Draw(Phase),
    Status,
    Clear { width: usize, height: usize },
    Validate(Phase),
}

#[derive(Debug)]
struct Args {
    command: Command,
    format: LogFormat,
    level: LogLevel,
}

fn parse_phase(value: Option<&str>) -> MegaverseResult<Phase> {
    match value {
        None | Some("phase1") => Ok(Phase::One),
        Some("phase2") => Ok(Phase::Two),
        Some(other) => Err(MegaverseError::configuration(format!(
            "unknown phase '{}'",
            other
        ))),
    }
}

fn parse_size(flag: &str, value: Option<String>) -> MegaverseResult<usize> {
    let value =
        value.ok_or_else(|| MegaverseError::configuration(format!("{} needs a value", flag)))?;
    value
        .parse()
        .map_err(|_| MegaverseError::configuration(format!("invalid {} '{}'", flag, value)))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> MegaverseResult<Args> {
    let mut format = LogFormat::Pretty;
    let mut level = LogLevel::Info;
    let mut positional = Vec::new();
    let mut width = 11;
    let mut height = 11;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json-logs" => format = LogFormat::Json,
            "--log-level" => {
                let value = args.next().ok_or_else(|| {
                    MegaverseError::configuration("--log-level needs a value")
                })?;
                level = value.parse()?;
            }
            "--width" => width = parse_size("--width", args.next())?,
            "--height" => height = parse_size("--height", args.next())?,
            flag if flag.starts_with("--") => {
                return Err(MegaverseError::configuration(format!(
                    "unknown flag '{}'",
                    flag
                )));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.iter().map(String::as_str);
    let command = match positional.next() {
        Some("phase1") => Command::Draw(Phase::One),
        Some("phase2") => Command::Draw(Phase::Two),
        Some("status") => Command::Status,
        Some("clear") => Command::Clear { width, height },
        Some("validate") => Command::Validate(parse_phase(positional.next())?),
        Some(other) => {
            return Err(MegaverseError::configuration(format!(
                "unknown command '{}'",
                other
            )));
        }
        None => return Err(MegaverseError::configuration("no command given")),
    };

    Ok(Args {
        command,
        format,
        level,
    })
}

/// Cancels `cancel` on Ctrl-C or once the execution timeout passes.
fn install_cancellation(cancel: &CancellationToken, config: &MegaverseConfig) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after in-flight requests");
            token.cancel();
        }
    });

    let token = cancel.clone();
    let timeout = config.execution_timeout;
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        tracing::warn!(?timeout, "Execution timeout reached");
        token.cancel();
    });
}

fn generator(client: &MegaverseClient, phase: Phase, cancel: &CancellationToken) -> Box<dyn PlanGenerator> {
    match phase {
        Phase::One => Box::new(client.cross_pattern()),
        Phase::Two => Box::new(client.logo_pattern().with_cancellation(cancel.clone())),
    }
}

fn print_summary(result: &AggregateResult) {
    println!(
        "Attempted {}, succeeded {}, failed {}, skipped {}",
        result.attempted,
        result.succeeded(),
        result.failed(),
        result.skipped
    );
    for failure in &result.failures {
        println!("  #{} {}: {}", failure.index + 1, failure.operation, failure.error);
    }
}

async fn run(command: Command, config: MegaverseConfig) -> MegaverseResult<bool> {
    let cancel = CancellationToken::new();
    install_cancellation(&cancel, &config);
    let client = MegaverseClient::builder().config(config).build()?;

    match command {
        Command::Draw(phase) => {
            let generator = generator(&client, phase, &cancel);
            let plan = client.plan(generator.as_ref()).await?;
            let result = client.run_with_cancel(&plan, &cancel).await;
            print_summary(&result);
            Ok(result.is_success())
        }
        Command::Status => {
            let config = client.config();
            println!("Candidate ID: {}", config.candidate_id_hint());
            println!("API Base URL: {}", config.base_url);
            match client.map().goal(&cancel).await {
                Ok(goal) => println!("Goal map dimensions: {}x{}", goal.columns(), goal.rows()),
                Err(err) => eprintln!("Warning: unable to fetch goal map: {}", err),
            }
            Ok(true)
        }
        Command::Clear { width, height } => {
            let report = client.clear(width, height, &cancel).await?;
            println!(
                "Checked {} cells, removed {} objects{}",
                report.cells_checked,
                report.removed,
                if report.cancelled { " (cancelled)" } else { "" }
            );
            Ok(!report.cancelled)
        }
        Command::Validate(phase) => {
            let generator = generator(&client, phase, &cancel);
            let plan = client.plan(generator.as_ref()).await?;
            let report = client.validate(&plan, &cancel).await?;
            println!("Checked {} operations", report.checked);
            for mismatch in &report.mismatches {
                println!("  {}", mismatch);
            }
            Ok(report.is_valid())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}\n\n{}", err, USAGE);
            return ExitCode::from(2);
        }
    };

    if let Err(err) = init_tracing(args.format, args.level) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    let config = match MegaverseConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(args.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
