//! Enterprise Splash CLI
//!
//! Runs the login splash against an in-memory page and prints what happened.
//!
//! ```text
//! enterprise-splash simulate --dots 3 --login-at 0 --duration 1000
//! enterprise-splash simulate --real-time --format json
//! enterprise-splash config --output config.toml
//! ```

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use enterprise_splash::config::{
    generate_default_config, Config, LoadedConfig, SimulationConfig,
};
use enterprise_splash::{
    logging, LocalWallClock, Page, PageSnapshot, Scheduler, SplashPage, TokioScheduler,
    VirtualScheduler, VirtualWallClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "enterprise-splash")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Login splash simulator: live clock, dot cascade and delayed redirect")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: searched in the usual locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a simulated splash page and let it run
    Simulate {
        /// Number of dot indicators
        #[arg(long)]
        dots: Option<usize>,
        /// Press login this many ms after load
        #[arg(long)]
        login_at: Option<u64>,
        /// Never press login
        #[arg(long, conflicts_with = "login_at")]
        no_login: bool,
        /// How long to run the page, in ms
        #[arg(long)]
        duration: Option<u64>,
        /// Use real timers instead of virtual time
        #[arg(long)]
        real_time: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => LoadedConfig {
            config: Config::load_with_env(path)?,
            source: Some(path.clone()),
            skipped: Vec::new(),
        },
        None => Config::discover(),
    };
    logging::init(&loaded.config.logging)?;

    for error in &loaded.skipped {
        tracing::warn!("Skipped config file: {}", error);
    }
    match &loaded.source {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::debug!("Using default config with environment overrides"),
    }
    let config = loaded.config;

    match cli.command {
        Commands::Simulate {
            dots,
            login_at,
            no_login,
            duration,
            real_time,
            format,
        } => {
            let mut sim = config.simulation;
            if let Some(dots) = dots {
                sim.dots = dots;
            }
            if let Some(duration) = duration {
                sim.duration_ms = duration;
            }
            if login_at.is_some() {
                sim.login_at_ms = login_at;
            }
            if no_login {
                sim.login_at_ms = None;
            }
            if real_time {
                sim.virtual_time = false;
            }

            tracing::info!(
                dots = sim.dots,
                duration_ms = sim.duration_ms,
                virtual_time = sim.virtual_time,
                "Loading splash page"
            );

            let snapshot = if sim.virtual_time {
                simulate_virtual(&sim)?
            } else {
                simulate_real_time(&sim).await?
            };

            match format {
                OutputFormat::Text => print!("{}", snapshot),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// Login time, if it falls inside the run
fn login_time(sim: &SimulationConfig) -> Option<Duration> {
    sim.login_at_ms
        .filter(|at| *at <= sim.duration_ms)
        .map(Duration::from_millis)
}

fn simulate_virtual(sim: &SimulationConfig) -> anyhow::Result<PageSnapshot> {
    let scheduler = Arc::new(VirtualScheduler::new());
    let timeline: Arc<dyn Scheduler> = scheduler.clone();
    let page = Arc::new(
        Page::login_splash(sim.page_title.as_str(), sim.dots).with_timeline(&timeline),
    );
    let wall_clock = Arc::new(VirtualWallClock::new(Local::now().naive_local(), &timeline));
    let splash = SplashPage::new(Arc::clone(&timeline), page.clone(), wall_clock);

    splash.start()?;

    if let Some(at) = login_time(sim) {
        scheduler.advance_to(at)?;
        if splash.is_active() {
            splash.login()?;
        }
    }

    scheduler.advance_to(Duration::from_millis(sim.duration_ms))?;
    splash.shutdown();

    Ok(page.snapshot())
}

async fn simulate_real_time(sim: &SimulationConfig) -> anyhow::Result<PageSnapshot> {
    let scheduler: Arc<dyn Scheduler> = TokioScheduler::start();
    let page = Arc::new(
        Page::login_splash(sim.page_title.as_str(), sim.dots).with_timeline(&scheduler),
    );
    let splash = SplashPage::new(Arc::clone(&scheduler), page.clone(), Arc::new(LocalWallClock));

    splash.start()?;

    let duration = Duration::from_millis(sim.duration_ms);
    let mut elapsed = Duration::ZERO;
    if let Some(at) = login_time(sim) {
        tokio::time::sleep(at).await;
        elapsed = at;
        if splash.is_active() {
            splash.login()?;
        }
    }

    tokio::time::sleep(duration.saturating_sub(elapsed)).await;
    splash.shutdown();

    Ok(page.snapshot())
}
