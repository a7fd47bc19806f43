use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use rand::Rng;
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use launcher_core::domain::{InitializationData, TaskRun, TaskRunConfig};
use launcher_core::impls::{InMemoryEntityStore, MOCK_PROVIDER_TYPE, MockProvider};
use launcher_core::options::{DescribeOptions, NO_TITLE, OptionGroup};
use launcher_core::ports::{IdGenerator, SystemClock, UlidGenerator};
use launcher_core::{LauncherConfig, TaskLauncher};

/// Launch a batch of units against the in-process mock provider.
#[derive(Debug, Parser)]
#[command(name = "launcher", version)]
struct Cli {
    /// Assignments to generate (ignored with --data)
    #[arg(long, default_value_t = 3)]
    records: usize,

    /// Units per generated assignment
    #[arg(long, default_value_t = 2)]
    units_per_assignment: usize,

    /// Units in flight at once (0 for no limit)
    #[arg(long, default_value_t = 2)]
    max_concurrent: usize,

    #[arg(long, default_value = "http://localhost:3000")]
    endpoint: String,

    /// JSON array of InitializationData records
    #[arg(long)]
    data: Option<PathBuf>,

    /// Reject this many launch attempts before accepting
    #[arg(long, default_value_t = 0)]
    reject: usize,

    /// Simulated worker pool size
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// How long a simulated worker holds a unit
    #[arg(long, default_value_t = 50)]
    work_millis: u64,

    /// Task reward paid per unit
    #[arg(long, default_value_t = 0.3)]
    task_reward: f64,

    /// Print the option schema as JSON and exit
    #[arg(long)]
    describe_options: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn option_schema() -> Value {
    schema_of(&[LauncherConfig::describe_options(), MockProvider::describe_options()])
}

fn schema_of(roots: &[OptionGroup]) -> Value {
    let mut out = Map::new();
    // untitled groups share one key, so they are listed rather than keyed
    let mut untitled = Vec::new();
    for root in roots {
        let index = root.groups_by_title();
        for (title, group) in index.titled {
            if let Some(dict) = group.to_argument_dict() {
                out.insert(title.to_string(), dict);
            }
        }
        untitled.extend(index.untitled.into_iter().filter_map(|group| group.to_argument_dict()));
    }
    if !untitled.is_empty() {
        out.insert(NO_TITLE.to_string(), Value::Array(untitled));
    }
    Value::Object(out)
}

fn load_records(cli: &Cli) -> Result<Vec<InitializationData>> {
    if let Some(path) = &cli.data {
        let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let records: Vec<InitializationData> =
            serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
        return Ok(records);
    }

    Ok((0..cli.records)
        .map(|r| {
            InitializationData::new(
                json!({ "assignment": r }),
                (0..cli.units_per_assignment)
                    .map(|u| json!({ "prompt": format!("item {r}.{u}") }))
                    .collect(),
            )
        })
        .collect())
}

/// Workers that pick up live units, hold them for a while, then finish them.
fn spawn_workers(provider: Arc<MockProvider>, count: usize, work: Duration) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move {
                loop {
                    let claimed = provider.live().into_iter().find(|id| provider.assign(*id));
                    let Some(unit_id) = claimed else {
                        sleep(Duration::from_millis(10)).await;
                        continue;
                    };
                    let jitter = rand::thread_rng().gen_range(0..=work.as_millis() as u64 / 2);
                    sleep(work + Duration::from_millis(jitter)).await;
                    provider.complete(unit_id);
                    tracing::debug!(worker, %unit_id, "worker: finished unit");
                }
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.describe_options {
        println!("{}", serde_json::to_string_pretty(&option_schema())?);
        return Ok(());
    }

    setup_logging(cli.verbose);

    let records = load_records(&cli)?;
    let task_run = Arc::new(TaskRun::new(
        UlidGenerator::new(SystemClock).generate_task_run_id(),
        MOCK_PROVIDER_TYPE,
        TaskRunConfig {
            task_reward: cli.task_reward,
            ..TaskRunConfig::default()
        },
    ));

    let (provider, events) = MockProvider::new();
    let provider = Arc::new(provider.with_assignment_duration(task_run.config.assignment_duration));
    provider.reject_next(cli.reject);
    let config = LauncherConfig::new(MOCK_PROVIDER_TYPE).with_max_num_concurrent_units(cli.max_concurrent);
    let launcher = TaskLauncher::new(Arc::new(InMemoryEntityStore::new()), provider.clone(), task_run, config)?;

    let listener = launcher.listen(events);
    let workers = spawn_workers(provider.clone(), cli.workers, Duration::from_millis(cli.work_millis));

    let materialized = launcher.materialize(&records).await?;
    info!(
        assignments = materialized.assignments.len(),
        units = materialized.units.len(),
        "materialized"
    );

    // rejected units come back at the head of the queue; give them a few more passes
    let mut passes = 0;
    loop {
        passes += 1;
        let summary = launcher.launch(&cli.endpoint).await?;
        if summary.deferred.is_empty() || summary.cancelled || passes >= 3 {
            if !summary.deferred.is_empty() {
                warn!(deferred = summary.deferred.len(), "units left unlaunched");
            }
            break;
        }
    }

    launcher.wait_idle().await;
    let report = launcher.shutdown().await?;
    for worker in workers {
        worker.abort();
    }
    listener.await?;

    let status = launcher.status().await;
    info!(
        completed = status.units.completed,
        expired = status.units.expired,
        peak_in_flight = status.peak_in_flight,
        capacity = ?status.capacity,
        expired_at_shutdown = report.expired,
        passes,
        "done"
    );
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untitled_groups_are_all_kept() {
        let roots = [
            OptionGroup::new("first").group(OptionGroup::untitled().description("misc a")),
            OptionGroup::new("second")
                .description("second options")
                .group(OptionGroup::untitled().description("misc b")),
        ];
        let schema = schema_of(&roots);

        assert_eq!(schema["second"]["desc"], "second options");
        assert!(schema.get("first").is_none());
        let untitled = schema[NO_TITLE].as_array().unwrap();
        let descs: Vec<&str> = untitled.iter().map(|g| g["desc"].as_str().unwrap()).collect();
        assert_eq!(descs, vec!["misc a", "misc b"]);
    }

    #[test]
    fn describe_options_lists_launcher_and_provider() {
        let schema = option_schema();
        assert!(schema.get("TaskLauncher").is_some());
        assert!(schema.get("MockProvider").is_some());
    }
}
