use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use jira_sprint_metrics::collector::{collect_data, collect_historic_issues, collect_sprints};
use jira_sprint_metrics::config::Config;
use jira_sprint_metrics::database::Database;
use jira_sprint_metrics::forecast::finished_between;
use jira_sprint_metrics::jira_client::JiraClient;
use jira_sprint_metrics::models::{Team, DUMP_TIME_FORMAT};
use jira_sprint_metrics::report;
use jira_sprint_metrics::routes::{router, AppState};
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sprint-metrics", about = "Sprint delivery metrics from Jira")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch from Jira and store the results
    #[command(subcommand)]
    Extract(Extract),
    /// Print sprint report rows as JSON
    Report {
        #[arg(long)]
        team: Option<String>,
        /// Only sprints starting at or after this time (YYYY-MM-DDTHH:MM:SS)
        #[arg(long, value_parser = parse_dump_time)]
        since: Option<NaiveDateTime>,
    },
    /// Print stored completed issues as JSON, optionally by finish time
    Dump {
        #[arg(long)]
        team: Option<String>,
        #[arg(long, value_parser = parse_dump_time)]
        start: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_dump_time)]
        end: Option<NaiveDateTime>,
    },
    /// Serve the dashboard, collecting sprints in the background
    Serve {
        /// Minutes between collections; 0 disables collection
        #[arg(long, default_value_t = 10)]
        collect_interval: u64,
    },
}

#[derive(Subcommand)]
enum Extract {
    /// The most recent closed sprints of each team
    Sprints {
        #[arg(long)]
        team: Option<String>,
        /// Number of sprints, overriding SPRINTS_PAST
        #[arg(long)]
        past: Option<usize>,
    },
    /// Every completed issue on each team's board
    Issues {
        #[arg(long)]
        team: Option<String>,
    },
}

fn parse_dump_time(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, DUMP_TIME_FORMAT).map_err(|e| format!("{value}: {e}"))
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn selected_teams(config: &Config, team: Option<&str>) -> Result<Vec<Team>, Box<dyn Error>> {
    match team {
        None => Ok(config.teams.clone()),
        Some(name) => match config.team(name) {
            Some(team) => Ok(vec![team.clone()]),
            None => Err(format!("team {name} is not configured").into()),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing("info");
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let database = Database::open(&config.database_path).await?;

    match cli.command {
        Command::Extract(Extract::Sprints { team, past }) => {
            let jira_client = JiraClient::new(&config.jira)?;
            let past = past.unwrap_or(config.sprints_past);
            for team in selected_teams(&config, team.as_deref())? {
                collect_sprints(&jira_client, &database, &config, &team, past).await?;
            }
        }
        Command::Extract(Extract::Issues { team }) => {
            let jira_client = JiraClient::new(&config.jira)?;
            for team in selected_teams(&config, team.as_deref())? {
                collect_historic_issues(&jira_client, &database, &config, &team).await?;
            }
        }
        Command::Report { team, since } => {
            let since = since.map(|since| since.format(DUMP_TIME_FORMAT).to_string());
            let mut rows = Vec::new();
            for team in selected_teams(&config, team.as_deref())? {
                for (sprint, auxiliary) in database.get_sprints_with_auxiliary(&team.name, since.as_deref()).await? {
                    rows.push(report::sprint_report(&team.name, &sprint, &auxiliary));
                }
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Dump { team, start, end } => {
            let mut records = Vec::new();
            for team in selected_teams(&config, team.as_deref())? {
                records.extend(database.get_historic_issues(&team.name).await?);
            }
            println!("{}", serde_json::to_string_pretty(&finished_between(&records, start, end))?);
        }
        Command::Serve { collect_interval } => serve(config, database, collect_interval).await?,
    }

    Ok(())
}

async fn serve(config: Config, database: Database, collect_interval: u64) -> Result<(), Box<dyn Error>> {
    for team in &config.teams {
        database.upsert_team(team).await?;
    }

    let state = AppState {
        database: Arc::new(database),
        config: Arc::new(config),
    };

    if collect_interval > 0 {
        let jira_client = JiraClient::new(&state.config.jira)?;
        let database = state.database.clone();
        let config = state.config.clone();
        tokio::spawn(async move {
            loop {
                collect_data(&jira_client, &database, &config).await;
                tracing::info!(minutes = collect_interval, "sleeping until next collection");
                tokio::time::sleep(tokio::time::Duration::from_secs(collect_interval * 60)).await;
            }
        });
    }

    let bind_addr = state.config.bind_addr.clone();
    let app = router(state);

    tracing::info!(addr = %bind_addr, "listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
