mod feed;
mod relay;
mod voyager;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bv_core::{LifecycleRules, Position, WarpDrive, attraction, focal_word, millis_to_iso8601, similarity};
use bv_store::{STARMAP_FILE, StarMap, resolve_data_dir};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::feed::FeedProducer;
use crate::voyager::{Voyager, VoyagerError};

#[derive(Parser)]
#[command(name = "bv", about = "Bubble-verse spatial semantic engine")]
struct Cli {
    /// Override the data directory (default: $BV_DATA_DIR or ~/.bubble-verse)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a thought into a bubble and publish it
    Ignite {
        /// Thought text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Resolve a search query to a camera target
    Warp {
        /// Query text
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Add one view to a bubble
    Pulse {
        /// Bubble id
        id: String,
    },

    /// Print the thought behind a bubble
    Hydrate {
        /// Bubble id
        id: String,
    },

    /// List every bubble in the universe
    List,

    /// Print universe events as JSON lines
    Observe {
        /// Keep watching for new changes
        #[arg(long)]
        follow: bool,

        /// Poll interval while following
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,
    },

    /// Apply entropy steps to every bubble
    Drift {
        /// Number of steps
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },

    /// Word-overlap similarity and attraction between two texts
    Affinity {
        /// First text
        a: String,
        /// Second text
        b: String,
    },

    /// Show universe statistics
    Stats,

    /// Start the HTTP relay
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind (0 picks a free one)
        #[arg(long, default_value_t = 8487)]
        port: u16,

        /// Star map poll interval
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,
    },
}

fn data_dir(cli: &Cli) -> PathBuf {
    resolve_data_dir(cli.data_dir.as_deref())
}

fn open_voyager(cli: &Cli) -> Result<Voyager> {
    Voyager::open(&data_dir(cli)).context("failed to open universe")
}

/// A voyager caught up with everything already published.
fn synced_voyager(cli: &Cli) -> Result<Voyager> {
    let mut voyager = open_voyager(cli)?;
    let applied = voyager.sync().context("failed to sync star map")?;
    tracing::debug!(applied, "synced universe");
    Ok(voyager)
}

fn open_feed_map(cli: &Cli, voyager: &Voyager) -> Result<StarMap> {
    StarMap::open(
        &data_dir(cli).join(STARMAP_FILE),
        &voyager.config().namespace,
    )
    .context("failed to open star map feed")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Ignite { text } => cmd_ignite(&cli, &text.join(" ")),
        Commands::Warp { query } => cmd_warp(&cli, &query.join(" ")),
        Commands::Pulse { id } => cmd_pulse(&cli, id),
        Commands::Hydrate { id } => cmd_hydrate(&cli, id),
        Commands::List => cmd_list(&cli),
        Commands::Observe {
            follow,
            interval_ms,
        } => cmd_observe(&cli, *follow, Duration::from_millis(*interval_ms)).await,
        Commands::Drift { steps } => cmd_drift(&cli, *steps),
        Commands::Affinity { a, b } => cmd_affinity(a, b),
        Commands::Stats => cmd_stats(&cli),
        Commands::Serve {
            host,
            port,
            interval_ms,
        } => cmd_serve(&cli, host, *port, Duration::from_millis(*interval_ms)).await,
    }
}

// ---------------------------------------------------------------------------
// Advisory pidfile for observability
// ---------------------------------------------------------------------------

fn pidfile_path(dir: &Path) -> PathBuf {
    dir.join("bv-serve.pid")
}

/// Check for an existing pidfile and log accordingly, then write our own.
fn acquire_pidfile(dir: &Path) -> Option<PathBuf> {
    let path = pidfile_path(dir);
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(pid) = content.trim().parse::<u32>()
    {
        if is_process_alive(pid) {
            tracing::warn!("another bv serve (PID {pid}) is running, sharing the star map");
        } else {
            tracing::info!("cleaned up stale pidfile (PID {pid} is dead)");
            let _ = std::fs::remove_file(&path);
        }
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::File::create(&path) {
        Ok(mut f) => {
            let _ = write!(f, "{}", std::process::id());
            tracing::info!("wrote pidfile: {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("failed to write pidfile: {e}");
            None
        }
    }
}

fn release_pidfile(path: &Path) {
    let _ = std::fs::remove_file(path);
    tracing::info!("removed pidfile: {}", path.display());
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false // conservative: assume dead on non-unix
}

/// Cancel `token` on ctrl-c or SIGTERM. The SIGTERM handler is registered
/// before this returns.
fn cancel_on_signals(token: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("received ctrl-c"),
            _ = terminate => tracing::info!("received SIGTERM"),
        }
        token.cancel();
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn print_bubble(bubble: &bv_core::Bubble, rules: &LifecycleRules) {
    let p = bubble.position;
    let fading = if rules.should_dissipate(bubble) {
        "  dissipating"
    } else {
        ""
    };
    println!(
        "{}  {:<16} views={:<4} scale={:.2}  ({:.1}, {:.1}, {:.1}){fading}",
        bubble.id,
        bubble.label,
        bubble.view_count,
        bubble.visual_scale(),
        p.x,
        p.y,
        p.z
    );
}

fn cmd_ignite(cli: &Cli, text: &str) -> Result<()> {
    let mut voyager = synced_voyager(cli)?;
    let bubble = match voyager.ignite(text) {
        Ok(bubble) => bubble,
        Err(VoyagerError::EmptyThought) => anyhow::bail!("nothing to ignite: thought is empty"),
        Err(e) => return Err(e).context("failed to ignite thought"),
    };
    println!("ignited {}", bubble.id);
    print_bubble(&bubble, &voyager.lifecycle());
    Ok(())
}

fn cmd_warp(cli: &Cli, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("nothing to warp to: query is empty");
    }
    let voyager = open_voyager(cli)?;
    let target = voyager.resolve_target(query);
    let drive = WarpDrive::new(voyager.config().navigator());
    let steps = drive.steps_to_arrive(Position::origin(), target);

    println!("focal word: {}", focal_word(query));
    println!("target:     ({:.1}, {:.1}, {:.1})", target.x, target.y, target.z);
    println!("steps:      {steps} from origin");
    Ok(())
}

fn cmd_pulse(cli: &Cli, id: &str) -> Result<()> {
    let mut voyager = synced_voyager(cli)?;
    let bubble = voyager
        .pulse(id)
        .with_context(|| format!("failed to pulse {id}"))?;
    println!("{} views={} scale={:.2}", bubble.id, bubble.view_count, bubble.visual_scale());
    Ok(())
}

fn cmd_hydrate(cli: &Cli, id: &str) -> Result<()> {
    let mut voyager = open_voyager(cli)?;
    match voyager.hydrate(id).context("failed to read thought")? {
        Some(text) => println!("{text}"),
        None => println!("The thought has evaporated..."),
    }
    Ok(())
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let voyager = synced_voyager(cli)?;
    if voyager.universe().is_empty() {
        println!("(the void is empty)");
        return Ok(());
    }
    let rules = voyager.lifecycle();
    for bubble in voyager.universe().bubbles() {
        print_bubble(bubble, &rules);
    }
    Ok(())
}

async fn cmd_observe(cli: &Cli, follow: bool, interval: Duration) -> Result<()> {
    let mut voyager = open_voyager(cli)?;
    let producer = FeedProducer::new(open_feed_map(cli, &voyager)?);

    let mut rx = if follow {
        let cancel = CancellationToken::new();
        cancel_on_signals(cancel.clone())?;
        let (_handle, rx) = feed::spawn(producer, interval, cancel);
        rx
    } else {
        let mut producer = producer;
        let (tx, rx) = mpsc::channel(feed::CHANNEL_CAPACITY);
        tokio::spawn(async move {
            producer.poll_once(&tx).await;
        });
        rx
    };

    let mut stdout = std::io::stdout();
    while let Some(change) = rx.recv().await {
        voyager.apply(&change);
        for event in voyager.drain_events() {
            let line = serde_json::to_string(&event).context("failed to encode event")?;
            writeln!(stdout, "{line}")?;
        }
        stdout.flush()?;
    }
    Ok(())
}

fn cmd_drift(cli: &Cli, steps: usize) -> Result<()> {
    let mut voyager = synced_voyager(cli)?;
    let published = voyager.drift(steps).context("failed to drift")?;
    println!("drifted {} bubbles over {steps} steps", published);

    let rules = voyager.lifecycle();
    let fading = voyager.universe().dissipation_candidates(&rules);
    if !fading.is_empty() {
        println!("dissipating:");
        for bubble in fading {
            println!("  {} ({:.0} from origin)", bubble.id, bubble.position.norm());
        }
    }
    Ok(())
}

fn cmd_affinity(a: &str, b: &str) -> Result<()> {
    println!("similarity: {:.3}", similarity(a, b));
    println!("attraction: {:.3}", attraction(a, b));
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let mut voyager = synced_voyager(cli)?;
    let rules = voyager.lifecycle();
    let bubbles = voyager.universe().bubbles();
    let views: u64 = bubbles.iter().map(|b| b.view_count).sum();
    let fading = voyager.universe().dissipation_candidates(&rules).len();
    let newest = bubbles.iter().map(|b| b.created_at).max();
    let count = bubbles.len();

    let records = voyager.record_count().context("failed to count records")?;
    let blobs = voyager.blob_count().context("failed to count thoughts")?;
    let settled = voyager
        .namespace_span()
        .context("failed to read namespace span")?;

    println!("namespace:   {}", voyager.config().namespace);
    if settled == voyager.config().span {
        println!("span:        {settled}");
    } else {
        println!("span:        {} (namespace {settled})", voyager.config().span);
    }
    println!("bubbles:     {count}");
    println!("views:       {views}");
    println!("dissipating: {fading}");
    println!("records:     {records}");
    println!("thoughts:    {blobs}");
    println!("cursor:      {}", voyager.cursor());
    if let Some(ts) = newest {
        println!("newest:      {}", millis_to_iso8601(ts));
    }
    Ok(())
}

async fn cmd_serve(cli: &Cli, host: &str, port: u16, interval: Duration) -> Result<()> {
    let dir = data_dir(cli);
    let voyager = open_voyager(cli)?;
    let producer = FeedProducer::new(open_feed_map(cli, &voyager)?);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let addr = listener.local_addr()?;

    let shutdown = CancellationToken::new();
    cancel_on_signals(shutdown.clone())?;
    let pidfile = acquire_pidfile(&dir);
    println!("relay listening on http://{addr}");

    let result = relay::run(voyager, producer, listener, interval, shutdown).await;

    if let Some(path) = pidfile {
        release_pidfile(&path);
    }
    result
}
