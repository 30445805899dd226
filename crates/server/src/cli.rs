//! Subcommands of the `mrqa` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use mrqa_compliance::CheckContext;
use mrqa_core::{parse_acq_date, Config};
use mrqa_ingest::{parse_line, FieldReader, TagList};
use mrqa_store::{IngestOutcome, ParameterStore, DEFAULT_LOOKBACK_DAYS};

use crate::state::AppState;
use crate::{audit, live, router, startup, update};

#[derive(Parser, Debug)]
#[command(name = "mrqa", version, about = "MR acquisition parameter compliance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// HTTP/WebSocket server with the live compliance feed.
    Serve {
        /// Directories to watch for new DICOMs (default: MRQA_WATCH_DIRS).
        #[arg(long = "watch")]
        watch: Vec<PathBuf>,
    },
    /// Store header-dump TSV lines from FILE, or stdin.
    Ingest { file: Option<PathBuf> },
    /// Scan project directories for sessions newer than the stored history.
    Update {
        /// Project directories (default: every project under MRQA_SCAN_ROOT).
        dirs: Vec<PathBuf>,
        /// Log headers instead of storing them (also set by DRYRUN).
        #[arg(long)]
        dry_run: bool,
    },
    /// Compare every acquisition since a date against its template.
    Audit {
        /// YYYY-MM-DD or YYYYMMDD (default: today minus --lookback-days).
        #[arg(long, value_parser = parse_since)]
        since: Option<NaiveDate>,
        /// Days to look back when --since is not given.
        #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
        lookback_days: u32,
        #[arg(long)]
        json: bool,
    },
    /// Read DICOM headers and compare them against stored templates.
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Apply realtime rules (missing FoV/TA/BWPPE allowed).
        #[arg(long)]
        realtime: bool,
    },
    /// Print the template of a protocol; `*` matches anything.
    Template { project: String, sequence: String },
}

fn parse_since(value: &str) -> Result<NaiveDate, String> {
    parse_acq_date(value).map_err(|e| e.to_string())
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve { watch } => serve(&config, watch).await,
        Command::Ingest { file } => ingest(&config, file).await,
        Command::Update { dirs, dry_run } => {
            let store = startup::open_store(&config).await?;
            let reader = startup::build_reader(&config)?;
            let dirs = if dirs.is_empty() {
                update::project_dirs(&config.update.scan_root)?
            } else {
                dirs
            };
            let summary = update::update_projects(
                &store,
                reader.as_ref(),
                &dirs,
                dry_run || config.update.dry_run,
            )
            .await?;
            println!("{}", serde_json::to_string(&summary)?);
            Ok(())
        }
        Command::Audit {
            since,
            lookback_days,
            json,
        } => {
            let store = startup::open_store(&config).await?;
            let checker = startup::build_checker(&config, store)?;
            let rows = audit::run_audit(&checker, since, lookback_days).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("{}", audit::TSV_HEADER);
                for row in &rows {
                    println!("{}", row.to_tsv());
                }
            }
            Ok(())
        }
        Command::Check { files, realtime } => {
            let store = startup::open_store(&config).await?;
            let checker = startup::build_checker(&config, store)?;
            let reader = startup::build_reader(&config)?;
            let ctx = if realtime {
                CheckContext::Realtime
            } else {
                CheckContext::Batch
            };
            for file in &files {
                let fields = reader.read(file).await;
                let record = checker.check_header(&fields, ctx).await?;
                if !record.conforms {
                    warn!(
                        file = %file.display(),
                        errors = %record.error_summary(),
                        "does not conform"
                    );
                }
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
        Command::Template { project, sequence } => {
            let store = startup::open_store(&config).await?;
            let checker = startup::build_checker(&config, store)?;
            match checker.inferencer().get_template(&project, &sequence).await? {
                Some(t) => println!("{}", serde_json::to_string_pretty(&t)?),
                None => println!("no template for {project}/{sequence}"),
            }
            Ok(())
        }
    }
}

async fn serve(config: &Config, watch: Vec<PathBuf>) -> anyhow::Result<()> {
    let store = startup::open_store(config).await?;
    let checker = startup::build_checker(config, store)?;
    let broadcaster = startup::build_broadcaster(config);

    let dirs = if watch.is_empty() {
        config.watch.dirs.clone()
    } else {
        watch
    };
    // Held for the life of the server; dropping it stops the feed.
    let _watcher = if dirs.is_empty() {
        warn!("no watch directories, serving history only");
        None
    } else {
        let reader = startup::build_reader(config)?;
        Some(
            live::spawn_monitor(
                &dirs,
                config.watch.event_queue,
                reader,
                checker.clone(),
                broadcaster.clone(),
                startup::monitor_settings(config),
            )
            .context("starting directory watch")?,
        )
    };

    let state = Arc::new(
        AppState::new(checker.inferencer().clone(), broadcaster).with_watch_dirs(dirs),
    );
    let app = router::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("mrqa listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest(config: &Config, file: Option<PathBuf>) -> anyhow::Result<()> {
    let store = startup::open_store(config).await?;
    let tags = TagList::load(config.reader.taglist.as_deref()).context("loading tag list")?;

    let counts = match file {
        Some(path) => {
            let f = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            ingest_lines(&store, &tags, BufReader::new(f)).await?
        }
        None => ingest_lines(&store, &tags, BufReader::new(tokio::io::stdin())).await?,
    };
    println!("{}", serde_json::to_string(&counts)?);
    Ok(())
}

#[derive(Debug, Default, serde::Serialize)]
pub struct IngestCounts {
    pub lines: usize,
    pub recorded: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub unparseable: usize,
}

/// Store every TSV line of `input`. Malformed lines are logged and skipped.
pub async fn ingest_lines<R>(
    store: &ParameterStore,
    tags: &TagList,
    input: R,
) -> anyhow::Result<IngestCounts>
where
    R: AsyncBufRead + Unpin,
{
    let mut counts = IngestCounts::default();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        counts.lines += 1;
        let fields = match parse_line(tags, &line) {
            Ok(f) => f,
            Err(e) => {
                warn!(line = counts.lines, error = %e, "skipping malformed line");
                counts.unparseable += 1;
                continue;
            }
        };
        match store.ingest(&fields).await? {
            IngestOutcome::Recorded { .. } => counts.recorded += 1,
            IngestOutcome::Duplicate => counts.duplicates += 1,
            IngestOutcome::MissingIdentity | IngestOutcome::MissingProject => counts.rejected += 1,
        }
    }
    info!(?counts, "ingest finished");
    Ok(counts)
}
