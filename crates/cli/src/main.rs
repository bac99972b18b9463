//! `trove` — command-line front-end for codetrove: store lifecycle,
//! indexing, search, and job inspection. Calls `codetrove-core` directly
//! with no server overhead, same shape as the teacher's `crates/cli/src/
//! main.rs` and `server/src/main.rs` (clap derive subcommands,
//! `tracing-subscriber` init, human/`--json` dual output).
//!
//! This binary is the thinnest possible wiring of the three capability
//! crates (`codetrove-embed`, `codetrove-store`, `codetrove-git`) behind
//! `codetrove-core`'s traits — it owns no engine logic of its own.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use codetrove_core::cache::ResultCache;
use codetrove_core::config::{resolve_config_path, resolve_project_root, Config};
use codetrove_core::error::Error;
use codetrove_core::indexer::Indexer;
use codetrove_core::jobs::JobTracker;
use codetrove_core::registry::{CreateStoreRequest, StoreRegistry};
use codetrove_core::search::SearchEngine;
use codetrove_core::types::{DetailLevel, JobStatus, JobType, SearchMode, SearchQuery, StoreKind};
use codetrove_core::{global_adapters, init_tracing};

use codetrove_embed::LocalEmbedder;
use codetrove_git::Git2Clone;
use codetrove_store::SqliteVectorStore;

#[derive(Parser)]
#[command(name = "trove", version, about = "Local code-and-documentation search engine")]
struct Cli {
    /// Project root (default: resolved per spec §6's hierarchy)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to config.json (default: `$CONFIG_PATH` or `<dataDir>/config.json`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store lifecycle: create, list, show, delete
    Store {
        #[command(subcommand)]
        command: StoreCommands,
    },
    /// Index a store end-to-end (scan, chunk, embed, write, build graph)
    Index {
        /// Store id or name
        store: String,
    },
    /// Search one or more stores
    Search {
        query: String,

        /// Store ids or names to search (repeatable)
        #[arg(long = "store", required = true)]
        stores: Vec<String>,

        #[arg(long, default_value = "hybrid")]
        mode: String,

        #[arg(long, default_value = "10")]
        limit: usize,

        #[arg(long, default_value = "minimal")]
        detail: String,

        #[arg(long)]
        threshold: Option<f64>,

        #[arg(long)]
        min_relevance: Option<f64>,
    },
    /// Fetch the full-detail record for a previously returned result id
    Fetch {
        /// Result id (as returned by `search`)
        id: String,

        /// Store the result came from
        #[arg(long)]
        store: String,

        /// The original query, to seed a narrow re-search on a cache miss
        #[arg(long)]
        query: String,
    },
    /// Inspect and manage background jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Create a local-folder store
    CreateFile {
        name: String,
        path: PathBuf,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Create a store from a git URL (cloned into the data dir) or an
    /// existing local repo checkout
    CreateRepo {
        name: String,
        #[arg(long, conflicts_with = "path")]
        url: Option<String>,
        #[arg(long, conflicts_with = "url")]
        path: Option<PathBuf>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List all stores
    List,
    /// Show one store
    Show { store: String },
    /// Delete a store (drops its table and any cloned working tree)
    Delete { store: String },
}

#[derive(Subcommand)]
enum JobCommands {
    List {
        #[arg(long)]
        active_only: bool,
    },
    Show { id: String },
    Cancel { id: String },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let project_root = resolve_project_root(cli.root.as_deref());
    let config_path_arg = cli.config.clone();

    let bootstrap_data_dir = project_root.join(".trove");
    let config_path = resolve_config_path(config_path_arg.as_deref(), &bootstrap_data_dir);
    let config = match Config::load_or_init(&config_path) {
        Ok(c) => c,
        Err(e) => fail(e),
    };
    let data_dir = config.resolved_data_dir(&project_root);

    let vector_store: Arc<SqliteVectorStore> = match SqliteVectorStore::open(&data_dir) {
        Ok(s) => Arc::new(s),
        Err(e) => fail(e),
    };
    let git: Arc<dyn codetrove_core::traits::GitClone> = Arc::new(Git2Clone::new());
    let registry = match StoreRegistry::open(data_dir.as_path(), vector_store.clone(), Some(git)) {
        Ok(r) => r,
        Err(e) => fail(e),
    };
    let jobs = match JobTracker::open(data_dir.as_path()) {
        Ok(j) => j,
        Err(e) => fail(e),
    };

    match cli.command {
        Commands::Store { command } => run_store_command(command, &registry, cli.json),
        Commands::Index { store } => run_index(&store, &registry, &jobs, vector_store.clone(), &data_dir, &config),
        Commands::Search { query, stores, mode, limit, detail, threshold, min_relevance } => {
            run_search(&query, stores, &mode, limit, &detail, threshold, min_relevance, &registry, vector_store.clone(), &data_dir, &config, cli.json)
        }
        Commands::Fetch { id, store, query } => run_fetch(&id, &store, &query, &registry, vector_store.clone(), &data_dir, &config, cli.json),
        Commands::Job { command } => run_job_command(command, &jobs, cli.json),
    }
}

fn fail(e: Error) -> ! {
    eprintln!("error: {e}");
    std::process::exit(e.exit_code());
}

fn resolve_store(registry: &StoreRegistry, id_or_name: &str) -> codetrove_core::types::Store {
    match registry.get_by_id_or_name(id_or_name) {
        Some(s) => s,
        None => fail(Error::NotFound(format!("store '{id_or_name}' not found"))),
    }
}

fn run_store_command(command: StoreCommands, registry: &StoreRegistry, json: bool) {
    match command {
        StoreCommands::CreateFile { name, path, description, tags } => {
            let kind = StoreKind::File { path: path.to_string_lossy().to_string() };
            let req = CreateStoreRequest { name, description: description.unwrap_or_default(), tags, kind, skip_definition_sync: false };
            match registry.create(req) {
                Ok(store) => print_store(&store, json),
                Err(e) => fail(e),
            }
        }
        StoreCommands::CreateRepo { name, url, path, branch, description, tags } => {
            let kind = if let Some(url) = url {
                StoreKind::Repo { path: String::new(), url: Some(url), branch }
            } else if let Some(path) = path {
                StoreKind::Repo { path: path.to_string_lossy().to_string(), url: None, branch }
            } else {
                eprintln!("error: one of --url or --path is required");
                std::process::exit(1);
            };
            let req = CreateStoreRequest { name, description: description.unwrap_or_default(), tags, kind, skip_definition_sync: false };
            match registry.create(req) {
                Ok(store) => print_store(&store, json),
                Err(e) => fail(e),
            }
        }
        StoreCommands::List => {
            let stores = registry.list();
            if json {
                println!("{}", serde_json::to_string_pretty(&stores).unwrap());
            } else if stores.is_empty() {
                println!("no stores");
            } else {
                for store in &stores {
                    println!("{:<34} {:<20} {:?}", store.id, store.name, store.status);
                }
            }
        }
        StoreCommands::Show { store } => {
            let store = resolve_store(registry, &store);
            print_store(&store, json);
        }
        StoreCommands::Delete { store } => {
            let store = resolve_store(registry, &store);
            match registry.delete(&store.id) {
                Ok(()) => println!("deleted {}", store.name),
                Err(e) => fail(e),
            }
        }
    }
}

fn print_store(store: &codetrove_core::types::Store, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(store).unwrap());
    } else {
        println!("id:     {}", store.id);
        println!("name:   {}", store.name);
        println!("kind:   {:?}", store.kind);
        println!("status: {:?}", store.status);
    }
}

fn run_index(
    store_arg: &str,
    registry: &StoreRegistry,
    jobs: &JobTracker,
    vector_store: Arc<SqliteVectorStore>,
    data_dir: &std::path::Path,
    config: &Config,
) {
    let store = resolve_store(registry, store_arg);
    let Some(root) = registry.root_path(&store) else {
        fail(Error::Unsupported(format!("store '{}' has no local filesystem root to index (web stores are crawled, not indexed, here)", store.name)));
    };

    let job = match jobs.create_job(JobType::Index, format!("indexing {}", store.name)) {
        Ok(j) => j,
        Err(e) => fail(e),
    };
    let _ = jobs.update_job(&job.id, Some(JobStatus::Running), Some(0), None, None);

    let embedder: Arc<dyn codetrove_core::traits::Embedder> = match LocalEmbedder::load(Some(&config.embedding.model)) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            let _ = jobs.update_job(&job.id, Some(JobStatus::Failed), None, Some(e.to_string()), None);
            fail(e);
        }
    };

    let adapters = global_adapters();
    let indexer = Indexer::new(embedder, vector_store, &adapters, data_dir);

    let result = indexer.index_store(&store.id, &root, &config.indexing.ignore_patterns, &|progress| {
        let pct = if progress.total == 0 { 0 } else { ((progress.current * 100) / progress.total).min(100) as u8 };
        let _ = jobs.update_job(&job.id, None, Some(pct), Some(progress.message.clone()), None);
    });

    match result {
        Ok(result) => {
            let _ = jobs.update_job(&job.id, Some(JobStatus::Completed), Some(100), Some("done".to_string()), None);
            let _ = registry.update(&store.id, None, None, Some(codetrove_core::types::StoreStatus::Ready));
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
        }
        Err(e) => {
            let _ = jobs.update_job(&job.id, Some(JobStatus::Failed), None, Some(e.to_string()), None);
            let _ = registry.update(&store.id, None, None, Some(codetrove_core::types::StoreStatus::Failed));
            fail(e);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_search(
    query: &str,
    store_args: Vec<String>,
    mode: &str,
    limit: usize,
    detail: &str,
    threshold: Option<f64>,
    min_relevance: Option<f64>,
    registry: &StoreRegistry,
    vector_store: Arc<SqliteVectorStore>,
    data_dir: &std::path::Path,
    config: &Config,
    json: bool,
) {
    let store_ids: Vec<String> = store_args.iter().map(|s| resolve_store(registry, s).id).collect();

    let mode = match mode {
        "vector" => SearchMode::Vector,
        "fts" => SearchMode::Fts,
        _ => SearchMode::Hybrid,
    };
    let detail = match detail {
        "contextual" => DetailLevel::Contextual,
        "full" => DetailLevel::Full,
        _ => DetailLevel::Minimal,
    };

    let embedder: Arc<dyn codetrove_core::traits::Embedder> = match LocalEmbedder::load(Some(&config.embedding.model)) {
        Ok(e) => Arc::new(e),
        Err(e) => fail(e),
    };
    let adapters = global_adapters();
    let engine = SearchEngine::new(embedder, vector_store, &adapters, data_dir);
    let cache = ResultCache::new(1000);

    let search_query =
        SearchQuery { query: query.to_string(), stores: store_ids, mode, limit, detail, threshold, min_relevance, intent: None };

    match engine.search(&search_query, &cache) {
        Ok(response) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&response).unwrap());
            } else {
                print_search_response(&response);
            }
        }
        Err(e) => fail(e),
    }
}

fn print_search_response(response: &codetrove_core::types::SearchResponse) {
    println!("{} result(s) for \"{}\" in {}ms", response.total_results, response.query, response.time_ms);
    if let Some(c) = response.confidence {
        println!("confidence: {c:?}");
    }
    for result in &response.results {
        println!();
        println!("{:.4}  {} {}  ({})", result.score, result.summary.kind, result.summary.name, result.summary.location);
        println!("      {}", result.summary.purpose);
        println!("      {}", result.summary.relevance_reason);
    }
}

fn run_fetch(
    id: &str,
    store_arg: &str,
    query: &str,
    registry: &StoreRegistry,
    vector_store: Arc<SqliteVectorStore>,
    data_dir: &std::path::Path,
    config: &Config,
    json: bool,
) {
    let store = resolve_store(registry, store_arg);
    let embedder: Arc<dyn codetrove_core::traits::Embedder> = match LocalEmbedder::load(Some(&config.embedding.model)) {
        Ok(e) => Arc::new(e),
        Err(e) => fail(e),
    };
    let adapters = global_adapters();
    let engine = SearchEngine::new(embedder, vector_store, &adapters, data_dir);
    let cache = ResultCache::new(1000);

    match engine.fetch_full(id, &store.id, query, &cache) {
        Some(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result).unwrap());
            } else if let Some(full) = &result.full {
                println!("{}", full.code);
            } else {
                println!("{}", result.summary.purpose);
            }
        }
        None => fail(Error::NotFound(format!("result '{id}' not found"))),
    }
}

fn run_job_command(command: JobCommands, jobs: &JobTracker, json: bool) {
    match command {
        JobCommands::List { active_only } => {
            let result = if active_only { jobs.list_active_jobs() } else { jobs.list_jobs(None) };
            match result {
                Ok(list) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&list).unwrap());
                    } else if list.is_empty() {
                        println!("no jobs");
                    } else {
                        for job in &list {
                            println!("{:<34} {:?} {:>3}% {}", job.id, job.status, job.progress, job.message);
                        }
                    }
                }
                Err(e) => fail(e),
            }
        }
        JobCommands::Show { id } => match jobs.get_job(&id) {
            Ok(job) => println!("{}", serde_json::to_string_pretty(&job).unwrap()),
            Err(e) => fail(e),
        },
        JobCommands::Cancel { id } => match jobs.cancel_job(&id) {
            Ok(job) => println!("cancelled {} ({})", job.id, job.message),
            Err(e) => fail(e),
        },
    }
}
