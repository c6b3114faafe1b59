//! Queue Tester CLI Tool
//!
//! In-process load and behaviour checks for the parlor-duel matching engine.
//!
//! Usage:
//!   cargo run --bin queue-tester -- --help
//!   cargo run --bin queue-tester simulate --players 200 --backend sharded
//!   cargo run --bin queue-tester stream --players 4 --duration 10

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use parlor_duel::config::{MatchmakingSettings, StorageBackend};
use parlor_duel::metrics::MetricsCollector;
use parlor_duel::service::MatchmakingService;
use parlor_duel::types::{JoinRequest, MatchOutcome, NotificationEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "queue-tester")]
#[command(about = "In-process queue testing tool for parlor-duel matchmaking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Storage backend (memory or sharded)
    #[arg(long, global = true, default_value = "memory")]
    backend: StorageBackend,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent pollers and verify no player lands in two matches
    Simulate {
        /// Number of players
        #[arg(short, long, default_value = "100")]
        players: usize,
        /// Width of the skill spread around 1000
        #[arg(short, long, default_value = "400")]
        spread: i64,
        /// Milliseconds between polls per player
        #[arg(long, default_value = "5")]
        poll_ms: u64,
        /// Polls per player before giving up
        #[arg(long, default_value = "200")]
        rounds: usize,
    },
    /// Open notification channels and print every event
    Stream {
        /// Number of players
        #[arg(short, long, default_value = "4")]
        players: usize,
        /// Seconds to wait before giving up
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },
}

/// Deterministic skill spread so runs are reproducible
fn skill_for(index: usize, spread: i64) -> i64 {
    if spread <= 0 {
        return 1000;
    }
    1000 - spread / 2 + ((index as i64 * 7919) % spread)
}

fn build_service(backend: StorageBackend, poll_ms: u64) -> Arc<MatchmakingService> {
    let settings = MatchmakingSettings {
        storage_backend: backend,
        poll_interval_ms: poll_ms.max(1),
        heartbeat_interval_seconds: 5,
        ..MatchmakingSettings::default()
    };
    Arc::new(MatchmakingService::from_settings(
        settings,
        Arc::new(MetricsCollector::default()),
    ))
}

async fn simulate(
    backend: StorageBackend,
    players: usize,
    spread: i64,
    poll_ms: u64,
    rounds: usize,
) -> Result<()> {
    let service = build_service(backend, poll_ms);
    println!(
        "🎲 Simulating {} players on the {} backend (spread {}, {} rounds)",
        players, backend, spread, rounds
    );

    for i in 0..players {
        let id = format!("player_{:04}", i);
        service
            .join_queue(JoinRequest::new(id.clone(), id, skill_for(i, spread)))
            .await?;
    }

    let started = Instant::now();
    let mut pollers = JoinSet::new();
    for i in 0..players {
        let service = service.clone();
        pollers.spawn(async move {
            let id = format!("player_{:04}", i);
            for _ in 0..rounds {
                match service.matcher().attempt(&id).await? {
                    MatchOutcome::Matched { match_id, .. }
                    | MatchOutcome::AlreadyMatched { match_id, .. } => {
                        return Ok::<_, anyhow::Error>((id, Some(match_id)));
                    }
                    MatchOutcome::NotFound => return Ok((id, None)),
                    MatchOutcome::Searching => {
                        tokio::time::sleep(Duration::from_millis(poll_ms)).await;
                    }
                }
            }
            Ok((id, None))
        });
    }

    let mut by_match: HashMap<String, Vec<String>> = HashMap::new();
    let mut unmatched = 0;
    while let Some(joined) = pollers.join_next().await {
        match joined?? {
            (id, Some(match_id)) => by_match.entry(match_id).or_default().push(id),
            (_, None) => unmatched += 1,
        }
    }

    let committed = service.match_store().count().await?;
    println!("⏱️  Finished in {:.2?}", started.elapsed());
    println!("   Matches committed: {}", committed);
    println!("   Matches observed:  {}", by_match.len());
    println!("   Players unmatched: {}", unmatched);

    for (match_id, members) in &by_match {
        if members.len() > 2 {
            bail!("Match {} was reported by {} players", match_id, members.len());
        }
        let Some(record) = service.match_store().get(match_id).await? else {
            bail!("Match {} was reported but never committed", match_id);
        };
        if let Some(stranger) = members
            .iter()
            .find(|id| record.opponent_of(id.as_str()).is_none())
        {
            bail!("Player {} reported match {} it is not part of", stranger, match_id);
        }
    }

    if by_match.len() as u64 != committed {
        bail!(
            "{} matches committed but {} observed",
            committed,
            by_match.len()
        );
    }

    println!("✅ No duplicate matches");
    Ok(())
}

async fn stream(backend: StorageBackend, players: usize, duration: u64) -> Result<()> {
    let service = build_service(backend, 500);
    println!("📡 Streaming events for {} players", players);

    let mut sessions = JoinSet::new();
    for i in 0..players {
        let id = format!("player_{:04}", i);
        service
            .join_queue(JoinRequest::new(id.clone(), id.clone(), skill_for(i, 100)))
            .await?;
        let mut session = service.open_notification_channel(&id)?;

        sessions.spawn(async move {
            let deadline = tokio::time::sleep(Duration::from_secs(duration));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => {
                        println!("[{}] ⌛ timed out", id);
                        session.handle().cancel();
                        return;
                    }
                    event = session.recv() => match event {
                        Some(event) => {
                            let terminal = event.is_terminal();
                            match &event {
                                NotificationEvent::KeepAlive => println!("[{}] : heartbeat", id),
                                other => println!(
                                    "[{}] {}",
                                    id,
                                    serde_json::to_string(other).unwrap_or_default()
                                ),
                            }
                            if terminal {
                                return;
                            }
                        }
                        None => return,
                    }
                }
            }
        });
    }

    while sessions.join_next().await.is_some() {}

    let stats = service.stats().await?;
    println!(
        "✅ Done: {} matches, {} still searching",
        stats.matches_created, stats.players_searching
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            players,
            spread,
            poll_ms,
            rounds,
        } => simulate(cli.backend, players, spread, poll_ms, rounds).await,
        Commands::Stream { players, duration } => stream(cli.backend, players, duration).await,
    }
}
