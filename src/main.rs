/// Version injected at compile time via SLSCTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("SLSCTL_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use slsctl::config::Config;
use slsctl::sls::auth::validate_project_name;
use slsctl::sls::error::format_sls_error;
use slsctl::sls::projects::{self, Project};
use slsctl::sls::tags::parse_tag;
use slsctl::{SlsClient, SlsError, Tags};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Describe, tag and poll Alibaba Cloud Log Service projects
#[derive(Parser, Debug)]
#[command(name = "slsctl", version, about, long_about = None)]
struct Args {
    /// Region to use
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Endpoint: public, intranet, or a URL template with {project} and {region}
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Deadline for tag updates, in seconds
    #[arg(long, global = true)]
    update_timeout: Option<u64>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a project as JSON
    Describe {
        project: String,
        /// Print a short summary instead of raw JSON
        #[arg(long)]
        summary: bool,
    },
    /// List the tags on a project
    Tags { project: String },
    /// Make the project's tags exactly the given key=value pairs
    SetTags {
        project: String,
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Wait until a project field reaches a target value
    Wait {
        project: String,
        /// Field path to read, e.g. status or $.status
        #[arg(long, default_value = "status")]
        field: String,
        /// Accepted values. With none, waits for the project to be gone.
        #[arg(long = "target")]
        targets: Vec<String>,
        /// Values that abort the wait
        #[arg(long = "fail")]
        fail_states: Vec<String>,
        /// Deadline in seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
    /// Remember a region as the default
    UseRegion { region: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("slsctl {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("slsctl").join("slsctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".slsctl").join("slsctl.log");
    }
    PathBuf::from("slsctl.log")
}

/// Turn an SLS error into a short message for the terminal
fn user_error(err: SlsError) -> anyhow::Error {
    tracing::error!("{:?}", err);
    anyhow::anyhow!(format_sls_error(&err))
}

fn checked_project(project: &str) -> Result<&str> {
    if !validate_project_name(project) {
        anyhow::bail!(
            "Invalid project name '{}': use 3-63 lowercase letters, digits or hyphens",
            project
        );
    }
    Ok(project)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let mut config = Config::load();

    let region = config.effective_region(args.region.as_deref());
    let endpoint = config.effective_endpoint(args.endpoint.as_deref())?;
    tracing::info!("Using region: {}, endpoint: {:?}", region, endpoint);

    let connect = || SlsClient::from_env(&region, endpoint.clone()).map_err(user_error);

    match args.command {
        Command::UseRegion { region } => {
            config.set_region(&region)?;
            println!("Default region set to {}", region);
        }
        Command::Describe { project, summary } => {
            let project = checked_project(&project)?;
            let client = connect()?;
            let object = projects::describe_project(&client, project)
                .await
                .map_err(user_error)?;
            if summary {
                let p = Project::from(&object);
                println!("name:        {}", p.project_name);
                println!("status:      {}", p.status);
                println!("region:      {}", p.region);
                println!("owner:       {}", p.owner);
                println!("description: {}", p.description);
                println!("created:     {}", p.create_time);
                println!("modified:    {}", p.last_modify_time);
            } else {
                println!("{}", serde_json::to_string_pretty(&object)?);
            }
        }
        Command::Tags { project } => {
            let project = checked_project(&project)?;
            let client = connect()?;
            let tags = projects::list_project_tags(&client, project)
                .await
                .map_err(user_error)?;
            for (key, value) in tags {
                println!("{}={}", key, value);
            }
        }
        Command::SetTags { project, tags } => {
            let project = checked_project(&project)?;
            let client = connect()?;
            let desired: Tags = tags.into_iter().collect();
            let current = projects::list_project_tags(&client, project)
                .await
                .map_err(user_error)?;
            let timeout = config.effective_update_timeout(args.update_timeout);
            projects::set_resource_tags(&client, project, &current, &desired, timeout)
                .await
                .map_err(user_error)?;
            println!("Tags updated on {}", project);
        }
        Command::Wait {
            project,
            field,
            targets,
            fail_states,
            timeout,
        } => {
            let project = checked_project(&project)?;
            let client = connect()?;
            let object = projects::wait_for_project_state(
                &client,
                project,
                &field,
                &targets,
                &fail_states,
                Duration::from_secs(timeout),
            )
            .await
            .map_err(user_error)?;
            match object {
                Some(object) => println!("{}", projects::field_value(&object, &field)),
                None => println!("{} is gone", project),
            }
        }
    }

    Ok(())
}
