use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waste_ledger::accounts::{self, Permission};
use waste_ledger::calc::leaderboard::load_leaderboard;
use waste_ledger::calc::{calculate_value, Category, LeaderboardEntry};
use waste_ledger::config::{Config, ConfigOverrides};
use waste_ledger::output::csv::{chart_to_csv, leaderboard_to_csv, material_table_to_csv};
use waste_ledger::output::json::render_json;
use waste_ledger::output::table::{
    render_chart_table, render_leaderboard_table, render_material_table, render_users_table,
};
use waste_ledger::output::xlsx::table_to_xlsx;
use waste_ledger::project::Project;
use waste_ledger::report::{build_chart, table_payload, ChartKind, ChartPayload, TablePayload};
use waste_ledger::server::run_server;
use waste_ledger::store::{ProjectRepository, SqliteStore};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "waste-ledger",
    about = "CO2 reduction ledger for construction and demolition waste recycling"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// SQLite database, overriding storage.db_path.
    #[arg(long)]
    db: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
    /// Compute a single named value for a project.
    Calc {
        #[arg(long)]
        project: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        material: Option<String>,
    },
    Table {
        #[arg(long)]
        project: String,
    },
    Chart {
        #[arg(long)]
        project: String,
        #[arg(long, default_value = "reduction")]
        kind: String,
    },
    Leaderboard,
    /// Write the two-sheet spreadsheet export of a project.
    Export {
        #[arg(long)]
        project: String,
        #[arg(long)]
        out: PathBuf,
    },
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        admin: bool,
    },
    Users,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    let (host, port) = match &cli.command {
        Commands::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    config.apply_overrides(ConfigOverrides {
        host,
        port,
        db_path: cli.db.clone(),
    });
    init_tracing(&config);

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }
    if matches!(cli.command, Commands::Serve { .. }) {
        let bind = config.bind_addr();
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let db_path = config.resolved_db_path();
    let store = SqliteStore::open(&db_path)?;

    match &cli.command {
        Commands::Calc {
            project,
            category,
            material,
        } => {
            let project = load_project(&store, project)?;
            let category: Category = category.parse()?;
            let value = calculate_value(&project, category, material.as_deref())?;
            print_value(category, material.as_deref(), value, cli.output)?;
        }
        Commands::Table { project } => {
            let project = load_project(&store, project)?;
            print_table(&table_payload(&project)?, cli.output)?;
        }
        Commands::Chart { project, kind } => {
            let project = load_project(&store, project)?;
            let kind: ChartKind = kind.parse().map_err(|e: String| anyhow!(e))?;
            print_chart(&build_chart(&project, kind)?, cli.output)?;
        }
        Commands::Leaderboard => {
            let entries = load_leaderboard(&store)?;
            print_leaderboard(&entries, cli.output)?;
        }
        Commands::Export { project, out } => {
            let project = load_project(&store, project)?;
            let bytes = table_to_xlsx(&table_payload(&project)?)?;
            std::fs::write(out, bytes)
                .with_context(|| format!("failed writing export: {}", out.display()))?;
            info!(project_id = %project.id, path = %out.display(), "export written");
            println!("Wrote {}", out.display());
        }
        Commands::CreateUser {
            name,
            email,
            password,
            admin,
        } => {
            let permission = if *admin {
                Permission::Admin
            } else {
                Permission::User
            };
            let user = accounts::create_user(&store, name, email, password, permission)?;
            println!("{}", render_json(&user)?);
        }
        Commands::Users => {
            let users = store.list_users()?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_users_table(&users)),
                OutputFormat::Json => println!("{}", render_json(&users)?),
                OutputFormat::Csv => {
                    warn!("CSV output for users not implemented, using JSON");
                    println!("{}", render_json(&users)?);
                }
            }
        }
        Commands::Serve { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn load_project(store: &SqliteStore, id: &str) -> Result<Project> {
    store
        .find_project(id)?
        .ok_or_else(|| anyhow!("project not found: {id}"))
}

fn print_value(
    category: Category,
    material: Option<&str>,
    value: f64,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table | OutputFormat::Csv => println!("{value:.2}"),
        OutputFormat::Json => println!(
            "{}",
            render_json(&json!({
                "category": category,
                "material": material,
                "value": value,
            }))?
        ),
    }
    Ok(())
}

fn print_table(payload: &TablePayload, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_material_table(payload)),
        OutputFormat::Json => println!("{}", render_json(payload)?),
        OutputFormat::Csv => println!("{}", material_table_to_csv(payload)?),
    }
    Ok(())
}

fn print_chart(payload: &ChartPayload, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_chart_table(payload)),
        OutputFormat::Json => println!("{}", render_json(payload)?),
        OutputFormat::Csv => println!("{}", chart_to_csv(payload)?),
    }
    Ok(())
}

fn print_leaderboard(entries: &[LeaderboardEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_leaderboard_table(entries)),
        OutputFormat::Json => println!("{}", render_json(entries)?),
        OutputFormat::Csv => println!("{}", leaderboard_to_csv(entries)?),
    }
    Ok(())
}
