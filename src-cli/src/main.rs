use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use baculum::db::{Catalog, RowExt};
use baculum::job::{JobMode, JobQuery, ResultView};
use baculum::object::{ObjectMode, ObjectQuery};
use baculum::source::{SourceMode, SourceProps};
use baculum::{
    load_config, AclResource, AllowedResources, BaculumError, BconsoleGateway, ConsoleGateway,
    Criteria, JobManager, ObjectManager, OrderDirection, QueryExecutor, Resource, ResourceManager,
    SourceManager,
};

/// Baculum catalog queries from the command line
#[derive(Parser, Debug)]
#[command(name = "baculum", version, about = "Query a Bacula catalog the way the Baculum API does")]
struct Cli {
    /// Path to the API config file (default: ~/.baculum/api.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Director used for console commands
    #[arg(short = 'D', long, default_value = "", global = true)]
    director: String,

    /// Restrict results to the resources the console user may see
    #[arg(long, global = true)]
    acl: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the catalog connection and report its size
    Check,

    /// List jobs
    Jobs {
        #[command(flatten)]
        page: Page,

        /// Criteria as JSON, e.g. '{"Job.Level": [{"vals": "F"}]}'
        #[arg(long)]
        criteria: Option<String>,

        #[arg(long, value_enum, default_value_t = JobListMode::Normal)]
        mode: JobListMode,

        /// Return only the basic job fields
        #[arg(long)]
        basic: bool,
    },

    /// Count jobs per status group
    JobStatus {
        #[arg(long)]
        criteria: Option<String>,
    },

    /// Jobs bucketed by status together with their objects
    JobsOverview {
        #[arg(long)]
        criteria: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: u64,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// Job ids needed to restore a job
    RestoreChain { jobid: i64 },

    /// List objects
    Objects {
        #[command(flatten)]
        page: Page,

        #[arg(long)]
        criteria: Option<String>,

        /// Object property to group by
        #[arg(long)]
        group_by: Option<String>,

        /// Add counts per group or object type
        #[arg(long)]
        overview: bool,

        /// Newest version of each object only
        #[arg(long)]
        unique: bool,
    },

    /// Latest state of every object and file backup by type
    ObjectsOverview {
        #[command(flatten)]
        page: Page,

        /// Job criteria
        #[arg(long)]
        criteria: Option<String>,

        /// Object criteria
        #[arg(long)]
        object_criteria: Option<String>,
    },

    /// Configured backup sources with their latest run
    Sources {
        #[command(flatten)]
        page: Page,

        #[arg(long)]
        criteria: Option<String>,

        #[arg(long)]
        job: Option<String>,

        #[arg(long)]
        client: Option<String>,

        #[arg(long)]
        fileset: Option<String>,

        /// Group by backup content type
        #[arg(long)]
        overview: bool,
    },

    /// List clients, filesets, pools, storages or volumes
    Resources {
        #[arg(value_enum)]
        kind: ResourceKind,

        /// Look up a single resource by name
        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value_t = 0)]
        limit: u64,

        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
}

#[derive(clap::Args, Debug)]
struct Page {
    #[arg(long, default_value_t = 0)]
    limit: u64,

    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Sort column
    #[arg(long)]
    order_by: Option<String>,

    /// asc or desc
    #[arg(long)]
    order: Option<String>,
}

impl Page {
    fn direction(&self, default: OrderDirection) -> Result<OrderDirection, CliError> {
        match &self.order {
            Some(o) => o.parse().map_err(|e| CliError::Baculum(BaculumError::Validation(e))),
            None => Ok(default),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum JobListMode {
    Normal,
    Overview,
    Group,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ResourceKind {
    Client,
    Fileset,
    Pool,
    Storage,
    Volume,
}

impl From<ResourceKind> for Resource {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Client => Resource::Client,
            ResourceKind::Fileset => Resource::FileSet,
            ResourceKind::Pool => Resource::Pool,
            ResourceKind::Storage => Resource::Storage,
            ResourceKind::Volume => Resource::Volume,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Baculum(#[from] BaculumError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No config file given and no home directory found")]
    NoConfig,
}

fn init_logging() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn parse_criteria(raw: Option<&str>) -> Result<Criteria, CliError> {
    match raw {
        Some(text) => {
            let value: Value = serde_json::from_str(text)?;
            Criteria::from_raw(&value).map_err(|e| CliError::Baculum(e.into()))
        }
        None => Ok(Criteria::new()),
    }
}

/// What every command needs from the catalog and the director.
struct Context<'a> {
    catalog: &'a Catalog<'a>,
    exec: &'a dyn QueryExecutor,
    console: &'a dyn ConsoleGateway,
    acl: &'a AllowedResources,
    director: &'a str,
}

impl Context<'_> {
    /// Narrows `criteria` to the visible resources. A resource with nothing
    /// visible leaves criteria that match no row.
    fn restrict(&self, criteria: &mut Criteria, resources: &[AclResource]) -> Result<(), CliError> {
        if !self.acl.apply(criteria, resources)? {
            debug!("Console ACL hides every {:?}", resources);
        }
        Ok(())
    }

    fn job_visible(&self, jobid: i64) -> Result<bool, CliError> {
        if self.acl.jobs().is_none() {
            return Ok(true);
        }
        let job = JobManager::new(self.exec).get_job_by_id(jobid)?;
        Ok(job
            .as_ref()
            .and_then(|j| j.get_str("name"))
            .is_some_and(|name| self.acl.allows(AclResource::Job, name)))
    }
}

fn run(cli: Cli) -> Result<Value, CliError> {
    let path = match cli.config {
        Some(p) => p,
        None => baculum::config::default_config_path().ok_or(CliError::NoConfig)?,
    };
    let config = load_config(&path).map_err(BaculumError::from)?;
    info!("Using catalog {}", config.db.describe());

    let catalog = Catalog::new(&config.db);
    let exec = catalog.connect().map_err(BaculumError::from)?;
    let console = BconsoleGateway::new(&config.console);

    let acl = if cli.acl {
        AllowedResources::from_console(&console, &cli.director).map_err(BaculumError::from)?
    } else {
        AllowedResources::unrestricted()
    };

    let ctx = Context {
        catalog: &catalog,
        exec: exec.as_ref(),
        console: &console,
        acl: &acl,
        director: &cli.director,
    };
    dispatch(cli.command, &ctx)
}

fn dispatch(command: Commands, ctx: &Context<'_>) -> Result<Value, CliError> {
    let exec = ctx.exec;
    let value = match command {
        Commands::Check => {
            let connected = ctx.catalog.test_connection(exec);
            let size = ctx.catalog.database_size(exec).map_err(BaculumError::from)?;
            serde_json::json!({ "connected": connected, "size": size })
        }
        Commands::Jobs {
            page,
            criteria,
            mode,
            basic,
        } => {
            let mut criteria = parse_criteria(criteria.as_deref())?;
            ctx.restrict(&mut criteria, &[AclResource::Job])?;
            let query = JobQuery {
                limit: page.limit,
                offset: page.offset,
                sort_col: page.order_by.clone(),
                sort_dir: page.direction(OrderDirection::Desc)?,
                mode: match mode {
                    JobListMode::Normal => JobMode::Normal,
                    JobListMode::Overview => JobMode::Overview,
                    JobListMode::Group => JobMode::Group,
                },
                view: if basic { ResultView::Basic } else { ResultView::Full },
            };
            serde_json::to_value(JobManager::new(exec).get_jobs(&criteria, &query)?)?
        }
        Commands::JobStatus { criteria } => {
            let mut criteria = parse_criteria(criteria.as_deref())?;
            ctx.restrict(&mut criteria, &[AclResource::Job])?;
            serde_json::to_value(JobManager::new(exec).get_job_count_by_js_group(&criteria)?)?
        }
        Commands::JobsOverview {
            criteria,
            limit,
            offset,
        } => {
            let mut criteria = parse_criteria(criteria.as_deref())?;
            ctx.restrict(&mut criteria, &[AclResource::Job])?;
            serde_json::to_value(JobManager::new(exec).get_jobs_objects_overview(
                &criteria,
                limit,
                offset,
                ResultView::Basic,
            ))?
        }
        Commands::RestoreChain { jobid } => {
            if !ctx.job_visible(jobid)? {
                return Ok(Value::Array(Vec::new()));
            }
            serde_json::to_value(JobManager::new(exec).get_jobids_to_restore(jobid)?)?
        }
        Commands::Objects {
            page,
            criteria,
            group_by,
            overview,
            unique,
        } => {
            let mut criteria = parse_criteria(criteria.as_deref())?;
            ctx.restrict(&mut criteria, &[AclResource::Job])?;
            let query = ObjectQuery {
                limit: page.limit,
                offset: page.offset,
                sort_col: page.order_by.clone(),
                sort_dir: page.direction(OrderDirection::Desc)?,
                group_by,
                mode: if overview {
                    ObjectMode::Overview
                } else {
                    ObjectMode::Normal
                },
                unique_objects: unique,
                ..Default::default()
            };
            serde_json::to_value(ObjectManager::new(exec).get_objects(&criteria, &query)?)?
        }
        Commands::ObjectsOverview {
            page,
            criteria,
            object_criteria,
        } => {
            let mut general = parse_criteria(criteria.as_deref())?;
            ctx.restrict(&mut general, &[AclResource::Job, AclResource::Client])?;
            let object = parse_criteria(object_criteria.as_deref())?;
            serde_json::to_value(ObjectManager::new(exec).get_objects_overview(
                &general,
                &object,
                page.limit,
                page.offset,
                page.order_by.as_deref(),
                page.direction(OrderDirection::Desc)?,
            )?)?
        }
        Commands::Sources {
            page,
            criteria,
            job,
            client,
            fileset,
            overview,
        } => {
            let criteria = parse_criteria(criteria.as_deref())?;
            let props = SourceProps {
                job,
                client,
                fileset,
                allowed: ctx.acl.clone(),
            };
            serde_json::to_value(SourceManager::new(exec, ctx.console).get_sources(
                ctx.director,
                &criteria,
                &props,
                page.limit,
                page.offset,
                page.order_by.as_deref(),
                page.direction(OrderDirection::Asc)?,
                if overview {
                    SourceMode::Overview
                } else {
                    SourceMode::Normal
                },
            )?)?
        }
        Commands::Resources {
            kind,
            name,
            limit,
            offset,
        } => {
            let resource = Resource::from(kind);
            let rm = ResourceManager::new(exec);
            match name {
                Some(name) => {
                    let hidden = resource.acl().is_some_and(|r| !ctx.acl.allows(r, &name));
                    if hidden {
                        Value::Null
                    } else {
                        serde_json::to_value(rm.by_name(resource, &name)?)?
                    }
                }
                None => {
                    let mut criteria = Criteria::new();
                    if let Some(r) = resource.acl() {
                        ctx.restrict(&mut criteria, &[r])?;
                    }
                    serde_json::to_value(rm.list(resource, &criteria, limit, offset)?)?
                }
            }
        }
    };
    Ok(value)
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("Failed to render output: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            let code = match &e {
                CliError::Baculum(err) => err.code(),
                _ => 1,
            };
            log::error!("{} (error {})", e, code);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baculum::{load_config_from_str, ApiConfig, SqliteSession};

    const CATALOG_SQL: &str = include_str!("../../crates/baculum/tests/fixtures/catalog.sql");

    fn config() -> ApiConfig {
        load_config_from_str(r#"{"db": {"type": "sqlite", "path": ":memory:"}}"#).unwrap()
    }

    fn session() -> SqliteSession {
        let session = SqliteSession::open_in_memory().unwrap();
        session.connection().execute_batch(CATALOG_SQL).unwrap();
        session
    }

    /// Console user who may see no job, no client and no pool.
    fn locked_out() -> AllowedResources {
        AllowedResources {
            jobs: Some(Vec::new()),
            clients: Some(Vec::new()),
            pools: Some(Vec::new()),
            ..Default::default()
        }
    }

    fn page() -> Page {
        Page {
            limit: 0,
            offset: 0,
            order_by: None,
            order: None,
        }
    }

    fn run_as(acl: &AllowedResources, command: Commands) -> Value {
        let config = config();
        let catalog = Catalog::new(&config.db);
        let session = session();
        let console = BconsoleGateway::new(&config.console);
        let ctx = Context {
            catalog: &catalog,
            exec: &session,
            console: &console,
            acl,
            director: "",
        };
        dispatch(command, &ctx).unwrap()
    }

    #[test]
    fn test_empty_job_acl_hides_status_counts() {
        let value = run_as(&locked_out(), Commands::JobStatus { criteria: None });
        for group in ["successful", "unsuccessful", "warning", "running", "all_terminated", "all"] {
            assert_eq!(value[group], 0, "{}", group);
        }

        let value = run_as(
            &AllowedResources::unrestricted(),
            Commands::JobStatus { criteria: None },
        );
        assert_eq!(value["all"], 13);
    }

    #[test]
    fn test_empty_job_acl_hides_jobs_overview() {
        let value = run_as(
            &locked_out(),
            Commands::JobsOverview {
                criteria: None,
                limit: 10,
                offset: 0,
            },
        );
        assert_eq!(value["overview"]["successful"]["count"], 0);
        assert_eq!(value["overview"]["all_terminated"]["count"], 0);
        assert_eq!(value["overview"]["all_terminated"]["jobs"], serde_json::json!([]));
    }

    fn objects_of(job: &str) -> Value {
        let acl = AllowedResources {
            jobs: Some(vec![job.to_string()]),
            ..Default::default()
        };
        run_as(
            &acl,
            Commands::Objects {
                page: page(),
                criteria: None,
                group_by: None,
                overview: false,
                unique: false,
            },
        )
    }

    #[test]
    fn test_job_acl_limits_objects() {
        assert_eq!(objects_of("pg-gamma").as_array().map(Vec::len), Some(6));
        assert_eq!(objects_of("backup-alpha"), serde_json::json!([]));

        let value = run_as(
            &locked_out(),
            Commands::ObjectsOverview {
                page: page(),
                criteria: None,
                object_criteria: None,
            },
        );
        let types = value["types"].as_array().unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0]["objecttype"], "files");
        assert_eq!(types[0]["count"], 0);
    }

    #[test]
    fn test_resource_acl() {
        let acl = locked_out();
        let pools = run_as(
            &acl,
            Commands::Resources {
                kind: ResourceKind::Pool,
                name: None,
                limit: 0,
                offset: 0,
            },
        );
        assert_eq!(pools, serde_json::json!([]));
        let pool = run_as(
            &acl,
            Commands::Resources {
                kind: ResourceKind::Pool,
                name: Some("Default".to_string()),
                limit: 0,
                offset: 0,
            },
        );
        assert_eq!(pool, Value::Null);

        let storages = run_as(
            &acl,
            Commands::Resources {
                kind: ResourceKind::Storage,
                name: None,
                limit: 0,
                offset: 0,
            },
        );
        assert_eq!(storages.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_volume_listing() {
        let value = run_as(
            &locked_out(),
            Commands::Resources {
                kind: ResourceKind::Volume,
                name: Some("Vol-0001".to_string()),
                limit: 0,
                offset: 0,
            },
        );
        assert_eq!(value["volumename"], "Vol-0001");
        assert_eq!(value["mediaid"], 1);
    }

    #[test]
    fn test_restore_chain_of_hidden_job() {
        let value = run_as(&locked_out(), Commands::RestoreChain { jobid: 4 });
        assert_eq!(value, serde_json::json!([]));
    }
}
