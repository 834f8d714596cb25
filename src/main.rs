//! harvest CLI
//!
//! Subcommands cover the batch driver (`run`), the per-account child
//! (`run-one`), the in-game flow against an already running client
//! (`game-flow`), and two offline helpers (`classify`, `stats`).
//! Exit codes follow the contract in [`wot_harvest::runner`].

use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use log::{error, info};

use wot_harvest::accounts::{write_result_file, Credentials};
use wot_harvest::config::Settings;
use wot_harvest::control::{native, ControlFlags, Desktop};
use wot_harvest::game::{FlowOutcome, GameFlow};
use wot_harvest::runner::{self, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};
use wot_harvest::vision::{SceneClassifier, TemplateStore};

#[derive(Parser)]
#[command(
    name = "harvest",
    version,
    about = "Vision-driven World of Tanks launcher automation"
)]
struct Cli {
    /// Settings file (JSON); built-in defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the scene dataset root
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
    /// Override the UI templates directory
    #[arg(long, global = true)]
    templates: Option<PathBuf>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Process every pending account, one child process per account
    Run {
        /// Override the pending accounts file
        #[arg(long)]
        accounts: Option<PathBuf>,
        /// Override the in-game time budget (seconds)
        #[arg(long)]
        max_secs: Option<u64>,
    },
    /// Run launcher login + in-game flow for a single account
    RunOne {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Where to write the chosen reward ids (comma-separated)
        #[arg(long)]
        result_file: Option<PathBuf>,
        #[arg(long)]
        max_secs: Option<u64>,
    },
    /// Run the in-game flow against an already running client
    GameFlow {
        #[arg(long)]
        result_file: Option<PathBuf>,
        #[arg(long)]
        max_secs: Option<u64>,
    },
    /// Classify a screenshot file against the dataset and print the match
    Classify { image: PathBuf },
    /// Print dataset statistics
    Stats,
}

fn load_settings(cli: &Cli) -> Result<Settings, String> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).map_err(|e| e.to_string())?,
        None => Settings::default(),
    };
    if let Some(dataset) = &cli.dataset {
        settings.dataset.root = dataset.clone();
        settings.dataset.templates = dataset.join("templates");
    }
    if let Some(templates) = &cli.templates {
        settings.dataset.templates = templates.clone();
    }
    Ok(settings)
}

fn build_classifier(settings: &Settings) -> Result<SceneClassifier, String> {
    SceneClassifier::from_dataset(&settings.dataset.root).map_err(|e| e.to_string())
}

fn build_desktop() -> Result<Desktop, String> {
    native::desktop().map_err(|e| e.to_string())
}

fn flow_exit_code(outcome: &FlowOutcome) -> i32 {
    match outcome {
        FlowOutcome::Completed { .. } => EXIT_SUCCESS,
        FlowOutcome::TimeBudgetExpired | FlowOutcome::Stopped => EXIT_FAILURE,
    }
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e}");
            exit(EXIT_USAGE);
        }
    };

    let code = match cli.command {
        Cmd::Run { accounts, max_secs } => {
            if let Some(accounts) = accounts {
                settings.batch.accounts_file = accounts;
            }
            if let Some(max_secs) = max_secs {
                settings.game.time_budget_secs = max_secs;
            }
            match runner::run_batch(&settings, cli.config.as_deref()) {
                Ok(summary) => {
                    info!(
                        "batch finished: {} succeeded, {} failed",
                        summary.succeeded, summary.failed
                    );
                    EXIT_SUCCESS
                }
                Err(e) => {
                    error!("batch failed: {e}");
                    EXIT_FAILURE
                }
            }
        }

        Cmd::RunOne {
            email,
            password,
            result_file,
            max_secs,
        } => {
            if let Some(max_secs) = max_secs {
                settings.game.time_budget_secs = max_secs;
            }
            let classifier = match build_classifier(&settings) {
                Ok(classifier) => classifier,
                Err(e) => {
                    error!("{e}");
                    exit(EXIT_USAGE);
                }
            };
            let mut desktop = match build_desktop() {
                Ok(desktop) => desktop,
                Err(e) => {
                    error!("{e}");
                    exit(EXIT_USAGE);
                }
            };
            let mut templates = TemplateStore::new(settings.dataset.templates.clone());
            let creds = Credentials::new(email, password);
            let outcome = runner::run_account(
                &settings,
                &classifier,
                &mut templates,
                &mut desktop,
                ControlFlags::new(),
                &creds,
            );
            if let (Some(path), wot_harvest::AccountOutcome::Success { rewards }) =
                (&result_file, &outcome)
            {
                if let Err(e) = write_result_file(path, rewards) {
                    error!("cannot write result file: {e}");
                }
            }
            outcome.exit_code()
        }

        Cmd::GameFlow {
            result_file,
            max_secs,
        } => {
            if let Some(max_secs) = max_secs {
                settings.game.time_budget_secs = max_secs;
            }
            let classifier = match build_classifier(&settings) {
                Ok(classifier) => classifier,
                Err(e) => {
                    error!("{e}");
                    exit(EXIT_USAGE);
                }
            };
            let mut desktop = match build_desktop() {
                Ok(desktop) => desktop,
                Err(e) => {
                    error!("{e}");
                    exit(EXIT_USAGE);
                }
            };
            let mut templates = TemplateStore::new(settings.dataset.templates.clone());
            let mut flow = GameFlow::new(
                &settings,
                &classifier,
                &mut templates,
                &mut desktop,
                ControlFlags::new(),
            );
            let outcome = flow.run();
            if let (Some(path), FlowOutcome::Completed { rewards }) = (&result_file, &outcome) {
                if let Err(e) = write_result_file(path, rewards) {
                    error!("cannot write result file: {e}");
                }
            }
            flow_exit_code(&outcome)
        }

        Cmd::Classify { image } => {
            let classifier = match build_classifier(&settings) {
                Ok(classifier) => classifier,
                Err(e) => {
                    error!("{e}");
                    exit(EXIT_USAGE);
                }
            };
            match image::open(&image) {
                Ok(img) => match classifier.classify(&img.to_rgba8()) {
                    Some(m) => {
                        println!(
                            "{} (distance {}, template {})",
                            m.scene,
                            m.distance,
                            m.template.display()
                        );
                        EXIT_SUCCESS
                    }
                    None => {
                        error!("template index is empty");
                        EXIT_USAGE
                    }
                },
                Err(e) => {
                    error!("cannot open {}: {e}", image.display());
                    EXIT_USAGE
                }
            }
        }

        Cmd::Stats => {
            let classifier = match build_classifier(&settings) {
                Ok(classifier) => classifier,
                Err(e) => {
                    error!("{e}");
                    exit(EXIT_USAGE);
                }
            };
            println!("{} templates total", classifier.len());
            for (scene, count) in classifier.scene_counts() {
                println!("  {scene}: {count}");
            }
            EXIT_SUCCESS
        }
    };
    exit(code);
}
