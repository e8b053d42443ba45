//! Schedule Dashboard
//!
//! Serves the factory-development Gantt dashboard behind HTTP Basic
//! authentication, and offers CLI access to its statistics and CSV export.

use anyhow::{Context, Result};
use clap::Parser;
use schedule_dashboard::cli::export::{ExportArgs, ExportTarget};
use schedule_dashboard::cli::watch::WatchArgs;
use schedule_dashboard::cli::{Cli, Command, ServeArgs, StatsArgs, StatsFormat};
use schedule_dashboard::config::Config;
use schedule_dashboard::dashboard;
use schedule_dashboard::export::export_rows;
use schedule_dashboard::logging::{self, LogTarget};
use schedule_dashboard::schedule::ScheduleModel;
use schedule_dashboard::schedule::stats::{Stats, compute_statistics};
use schedule_dashboard::schedule::years::YearFilter;
use schedule_dashboard::session::{
    DashboardSession, HttpTaskSource, RetryPolicy, run_refresh_loop,
};
use schedule_dashboard::store::watcher::start_store_watcher;
use schedule_dashboard::store::{SharedStore, build_model, parse_task_file};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(tasks) = &cli.tasks {
        config.server.tasks_path = tasks.clone();
    }

    match cli.command {
        Some(Command::Export(args)) => run_export(&config, args)?,
        Some(Command::Stats(args)) => run_stats(&config, args)?,
        Some(Command::Watch(args)) => run_watch(&config, args).await?,
        Some(Command::Serve(args)) => run_server(config, args).await?,
        None => run_server(config, ServeArgs::default()).await?,
    }

    Ok(())
}

/// Load the task store file and build the model for `filter`.
fn load_model(config: &Config, filter: YearFilter) -> Result<ScheduleModel> {
    let path = &config.server.tasks_path;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading task store {}", path.display()))?;
    let file = parse_task_file(&text)?;
    let model = build_model(&file, filter, config.schedule.validation_policy())
        .with_context(|| format!("building schedule from {}", path.display()))?;
    Ok(model)
}

fn run_export(config: &Config, args: ExportArgs) -> Result<()> {
    let model = load_model(config, args.year)?;
    let report = export_rows(&model);
    for err in &report.errors {
        warn!("Degraded export row: {}", err);
    }
    let csv = report.to_csv();

    let today = chrono::Local::now().date_naive();
    match args.target(&config.schedule.export_slug, today) {
        ExportTarget::Stdout => {
            std::io::stdout().write_all(csv.as_bytes())?;
        }
        ExportTarget::File(path) => {
            std::fs::write(&path, csv)
                .with_context(|| format!("writing export {}", path.display()))?;
            eprintln!("Exported {} task(s) to {}", report.rows.len(), path.display());
        }
    }
    Ok(())
}

fn run_stats(config: &Config, args: StatsArgs) -> Result<()> {
    let model = load_model(config, args.year)?;
    let stats = compute_statistics(model.each_task());

    match args.format {
        StatsFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        StatsFormat::Text => {
            let buckets = config.schedule.year_buckets.classify(&model);
            print_stats(&stats, args.year);
            println!("Year-bucketed:  {}", buckets.len());
        }
    }
    Ok(())
}

fn print_stats(stats: &Stats, filter: YearFilter) {
    println!("Filter:         {}", filter);
    println!("Total tasks:    {}", stats.total);
    println!("Completed:      {}", stats.completed);
    println!("In progress:    {}", stats.in_progress);
    println!("Critical:       {}", stats.critical);
    println!("Overall:        {}%", stats.overall_progress_percent);
}

fn report_session(session: &mut DashboardSession) {
    if let Some(notice) = session.take_notice() {
        eprintln!("{}", notice);
    }
    print_stats(&session.stats(), session.filter());
}

async fn run_watch(config: &Config, args: WatchArgs) -> Result<()> {
    let source = HttpTaskSource::new(
        &args.url,
        config.auth.clone(),
        config.dashboard.fetch_timeout(),
    )?;
    let retry = RetryPolicy::from(&config.dashboard);
    let mut session = DashboardSession::new(
        config.schedule.year_buckets.clone(),
        config.schedule.validation_policy(),
    );

    if args.once {
        session.reload(&source, args.year, &retry).await;
        report_session(&mut session);
        return Ok(());
    }

    session.select_filter(args.year);

    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.dashboard.refresh_interval());
    info!("Following {} every {:?}", args.url, interval);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    run_refresh_loop(&mut session, &source, &retry, interval, shutdown, |s, outcome| {
        info!(?outcome, "Refreshed");
        report_session(s);
    })
    .await;
    Ok(())
}

async fn run_server(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    let config = Arc::new(config);

    let store = Arc::new(SharedStore::open(&config.server.tasks_path));

    let _watcher = if config.server.watch && !args.no_watch {
        match start_store_watcher(
            Arc::clone(&store),
            Duration::from_millis(config.server.watch_debounce_ms),
        ) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Task store watcher disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let (shutdown_tx, addr) = dashboard::start_server(store, Arc::clone(&config)).await?;
    info!("Dashboard running at http://{}", addr);

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(());
    Ok(())
}
