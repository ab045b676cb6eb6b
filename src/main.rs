//! deskcoach CLI entry point.
//!
//! Provides `scenarios`, `grade`, `practice`, `reference` and `check`
//! subcommands. This is the presentation layer: it owns logging of
//! failures, rendering, and the decision to retry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tracing::{debug, info, warn};

use deskcoach::config::{self, AppConfig, CONFIG_PATH_VAR};
use deskcoach::credentials::{load_dotenv, resolve_api_key, Credentials, API_KEY_VAR};
use deskcoach::error::CoachError;
use deskcoach::grading::client::classify_provider_error;
use deskcoach::grading::{GradingClient, TraineeReply};
use deskcoach::logging;
use deskcoach::profile::load_profile;
use deskcoach::reference::{TrainingReference, DEFAULT_TOP_K};
use deskcoach::render::{
    render_error, render_result, render_scenario, render_scenario_line, render_sections,
};
use deskcoach::scenario::Scenario;
use deskcoach::session::{build_provider, load_scenarios, Session};

/// Practise front-desk replies with an LLM manager grading them.
#[derive(Parser)]
#[command(name = "deskcoach", version, about)]
struct Cli {
    /// Config file (default: ./deskcoach.toml or $DESKCOACH_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// List the available scenarios.
    Scenarios,
    /// Grade one reply and exit.
    Grade {
        /// Scenario id.
        #[arg(long, short)]
        scenario: String,
        /// Reply text; read from stdin when omitted.
        #[arg(long, short)]
        reply: Option<String>,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Practise interactively.
    Practice {
        /// Start with this scenario instead of a random one.
        #[arg(long, short)]
        scenario: Option<String>,
    },
    /// Inspect the training reference.
    Reference {
        /// Reference action.
        #[command(subcommand)]
        action: ReferenceAction,
    },
    /// Validate configuration, credential and data files.
    Check {
        /// Also call the configured endpoint: list models and send one
        /// short completion.
        #[arg(long)]
        live: bool,
    },
}

/// Training reference actions.
#[derive(Subcommand)]
enum ReferenceAction {
    /// Show the sections matching a query.
    Search {
        /// Query words.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Number of sections to show.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Show section count and source.
    Stats,
    /// Report which queries the reference does not cover.
    Gaps {
        /// Queries to analyse.
        #[arg(required = true, num_args = 1..)]
        queries: Vec<String>,
    },
}

/// Loaded configuration and `.env` values.
struct Runtime {
    config: AppConfig,
    credentials: Credentials,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config_override = cli.config.clone();
    let mut config = AppConfig::load(|key| match (key, &config_override) {
        (CONFIG_PATH_VAR, Some(path)) => Some(path.display().to_string()),
        _ => std::env::var(key).ok(),
    })
    .context("failed to load configuration")?;

    let credentials = load_dotenv(&config.paths.dotenv)
        .with_context(|| format!("failed to load {}", config.paths.dotenv.display()))?;
    config
        .apply_overrides(|key| credentials.lookup(key))
        .context("invalid environment override")?;
    config.validate().context("invalid configuration")?;

    let _logging_guard = match &cli.command {
        Command::Practice { .. } => {
            let dir = config::logs_dir(&config)?;
            Some(logging::init_session(&dir).context("failed to initialise logging")?)
        }
        _ => {
            logging::init_cli();
            None
        }
    };

    let rt = Runtime {
        config,
        credentials,
    };

    match cli.command {
        Command::Scenarios => handle_scenarios(&rt),
        Command::Grade {
            scenario,
            reply,
            json,
        } => handle_grade(&rt, &scenario, reply, json).await,
        Command::Practice { scenario } => handle_practice(&rt, scenario.as_deref()).await,
        Command::Reference { action } => handle_reference(&rt, action),
        Command::Check { live } => Ok(handle_check(&rt, live).await),
    }
}

/// List scenarios without requiring a credential.
fn handle_scenarios(rt: &Runtime) -> anyhow::Result<ExitCode> {
    let catalog = load_scenarios(&rt.config).context("failed to load scenarios")?;
    for scenario in catalog.iter() {
        println!("{}", render_scenario_line(scenario));
    }
    Ok(ExitCode::SUCCESS)
}

/// Grade a single reply and print the result.
async fn handle_grade(
    rt: &Runtime,
    scenario_id: &str,
    reply: Option<String>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let session = match Session::from_config(&rt.config, &rt.credentials) {
        Ok(session) => session,
        Err(err) => {
            debug!(error = %err, "session startup failed");
            eprint!("{}", render_error(&err));
            return Ok(exit_code(&err));
        }
    };

    let text = match reply {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read reply from stdin")?;
            buf.trim_end_matches(['\r', '\n']).to_owned()
        }
    };

    let reply = TraineeReply::new(scenario_id, text);
    match session.submit(&reply).await {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_result(&result));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            debug!(scenario = scenario_id, error = %err, "grading failed");
            eprint!("{}", render_error(&err));
            Ok(exit_code(&err))
        }
    }
}

/// Interactive practice loop.
///
/// Retry on transport or schema failures is offered here, never in the library.
async fn handle_practice(rt: &Runtime, first: Option<&str>) -> anyhow::Result<ExitCode> {
    let session =
        Session::from_config(&rt.config, &rt.credentials).context("failed to start session")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut current: Scenario = match first {
        Some(id) => session.scenarios().require(id)?.clone(),
        None => random_scenario(&session),
    };

    println!(
        "Practising for {} (grader: {}).\n",
        session.profile().name(),
        session.model_id()
    );

    loop {
        print!("{}", render_scenario(&current));
        let Some(text) = read_reply(&mut lines).await? else {
            break;
        };

        let reply = TraineeReply::new(current.id.clone(), text);
        let payload = match session.prepare(&reply) {
            Ok(payload) => payload,
            Err(err) => {
                print!("{}", render_error(&err));
                continue;
            }
        };

        loop {
            match session.grade(&payload).await {
                Ok(result) => {
                    info!(
                        scenario = %current.id,
                        policy = result.policy_score(),
                        tone = result.tone_score(),
                        clarity = result.clarity_score(),
                        "reply graded"
                    );
                    println!();
                    print!("{}", render_result(&result));
                    break;
                }
                Err(err) => {
                    warn!(scenario = %current.id, error = %err, "grading failed");
                    print!("{}", render_error(&err));
                    if !err.is_retryable() {
                        break;
                    }
                    let answer = ask(&mut lines, "Retry with the same reply? [Y/n] ").await?;
                    if matches!(answer.as_deref(), Some("n" | "N") | None) {
                        break;
                    }
                }
            }
        }

        let answer = ask(&mut lines, "\n[n]ext scenario, [a]gain, [q]uit: ").await?;
        match answer.as_deref() {
            Some("q" | "Q") | None => break,
            Some("a" | "A") => {}
            _ => current = random_scenario(&session),
        }
        println!();
    }

    println!("Goodbye.");
    Ok(ExitCode::SUCCESS)
}

/// Search, stats and gap analysis over the training reference.
fn handle_reference(rt: &Runtime, action: ReferenceAction) -> anyhow::Result<ExitCode> {
    let reference =
        TrainingReference::load(&rt.config.paths.reference).context("failed to load reference")?;
    match action {
        ReferenceAction::Search { query, top_k } => {
            print!("{}", render_sections(&reference.search_by_keywords(&query, top_k)));
        }
        ReferenceAction::Stats => {
            let stats = reference.stats();
            println!("{} sections from {}", stats.total_sections, stats.source);
        }
        ReferenceAction::Gaps { queries } => {
            let report = reference.content_gaps(&queries);
            for gap in &report.gaps {
                println!("uncovered: {} ({} fallback results)", gap.query, gap.result_count);
            }
            println!(
                "{} of {} queries uncovered",
                report.gap_count, report.total_queries
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Load every startup dependency and report each one.
///
/// With `live`, also exercise the endpoint the way a grading would.
async fn handle_check(rt: &Runtime, live: bool) -> ExitCode {
    let config = &rt.config;
    let results = [
        report(
            "config",
            Ok(format!("model {} at {}", config.llm.model, config.llm.base_url)),
        ),
        report(
            "credential",
            resolve_api_key(|key| rt.credentials.lookup(key)).map(|_| format!("{API_KEY_VAR} set")),
        ),
        report(
            "profile",
            load_profile(&config.paths.profile, config.hotel.id.as_deref()).map(|p| {
                format!(
                    "{} ({} tone guidelines, {} policies, {} phrases)",
                    p.name(),
                    p.tone_guidelines().len(),
                    p.key_policies().len(),
                    p.example_phrases().len()
                )
            }),
        ),
        report(
            "scenarios",
            load_scenarios(config).map(|c| format!("{} scenarios", c.len())),
        ),
        report(
            "reference",
            TrainingReference::load(&config.paths.reference).map(|r| {
                let stats = r.stats();
                format!("{} sections from {}", stats.total_sections, stats.source)
            }),
        ),
    ];

    let live_ok = if live { check_endpoint(rt).await } else { true };

    if live_ok && results.iter().all(|ok| *ok) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// List the endpoint's models and send one short completion.
async fn check_endpoint(rt: &Runtime) -> bool {
    let provider = match resolve_api_key(|key| rt.credentials.lookup(key))
        .and_then(|key| build_provider(&rt.config, key))
    {
        Ok(provider) => provider,
        Err(err) => return report("endpoint", Err(err)),
    };

    let model = &rt.config.llm.model;
    let listed = provider
        .list_models()
        .await
        .map_err(classify_provider_error)
        .and_then(|ids| {
            if ids.iter().any(|id| id == model) {
                Ok(format!("{} listed, {model} among them", ids.len()))
            } else {
                Err(CoachError::config(format!(
                    "model `{model}` is not among the {} listed by {}",
                    ids.len(),
                    rt.config.llm.base_url
                )))
            }
        });
    let models_ok = report("models", listed);

    let client = GradingClient::new(Arc::new(provider));
    let completion_ok = report(
        "completion",
        client.ping().await.map(|answered| format!("answered by {answered}")),
    );

    models_ok && completion_ok
}

fn report(label: &str, outcome: Result<String, CoachError>) -> bool {
    match outcome {
        Ok(detail) => {
            println!("ok    {label:<11} {detail}");
            true
        }
        Err(err) => {
            println!("FAIL  {label:<11} {err}");
            false
        }
    }
}

fn random_scenario(session: &Session) -> Scenario {
    session.scenarios().choose(&mut rand::thread_rng()).clone()
}

/// Read a multi-line reply terminated by an empty line.
///
/// Returns `None` on end of input or when the trainee types `q`.
async fn read_reply<R>(lines: &mut Lines<R>) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    prompt("Your reply (finish with an empty line, 'q' to quit):\n")?;
    let mut collected: Vec<String> = Vec::new();
    loop {
        match lines.next_line().await.context("failed to read stdin")? {
            None if collected.is_empty() => return Ok(None),
            None => return Ok(Some(collected.join("\n"))),
            Some(line) if collected.is_empty() && line.trim() == "q" => return Ok(None),
            Some(line) if line.trim().is_empty() => return Ok(Some(collected.join("\n"))),
            Some(line) => collected.push(line),
        }
    }
}

async fn ask<R>(lines: &mut Lines<R>, question: &str) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    prompt(question)?;
    let line = lines.next_line().await.context("failed to read stdin")?;
    Ok(line.map(|l| l.trim().to_owned()))
}

fn prompt(text: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn exit_code(err: &CoachError) -> ExitCode {
    ExitCode::from(match err {
        CoachError::Validation(_) => 2,
        CoachError::Config(_) => 3,
        CoachError::Transport { .. } => 4,
        CoachError::Schema(_) => 5,
    })
}
