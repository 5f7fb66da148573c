//! village-runner: headless session runner for the eco-village game.
//!
//! Usage:
//!   village-runner --seed 12345 --ticks 300
//!   village-runner --seed 12345 --data-dir ./data --ipc-mode

use anyhow::Result;
use ecovillage_core::{
    command::PlayerCommand,
    config::SessionConfig,
    engine::SessionEngine,
    oracle::VillageElderOracle,
    snapshot::SessionSnapshot,
    store::JournalCategory,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        count: u64,
    },
    Command {
        command: PlayerCommand,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct IpcReply<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected: Option<String>,
    state:    &'a SessionSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 300u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str());

    let config = match data_dir {
        Some(dir) => SessionConfig::load(dir)?,
        None => SessionConfig::standard(),
    };

    if !ipc_mode {
        println!("Eco-Village — village-runner");
        println!("  seed:      {seed}");
        println!("  ticks:     {ticks}");
        println!("  data_dir:  {}", data_dir.unwrap_or("(built-in)"));
        println!();
    }

    let started_at = chrono::Utc::now();
    let session_id = format!("session-{seed}-{}", started_at.timestamp());
    let mut engine = SessionEngine::build(
        session_id,
        seed,
        config,
        Arc::new(VillageElderOracle::new()),
        started_at,
    )?;

    if ipc_mode {
        run_ipc_loop(&mut engine).await?;
    } else {
        run_autopilot(&mut engine, ticks).await?;
        print_summary(&engine, ticks)?;
    }

    Ok(())
}

/// Line-delimited JSON on stdin/stdout. Every request is answered with
/// the current snapshot.
async fn run_ipc_loop(engine: &mut SessionEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = stdin.lock().read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let mut rejected = None;
        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Tick { count } => {
                engine.run_ticks(count)?;
                engine.flush_advisories().await?;
            }
            IpcCommand::GetState => {}
            IpcCommand::Command { command } => {
                if let Err(e) = engine.submit(command) {
                    rejected = Some(e.to_string());
                }
                engine.flush_advisories().await?;
            }
        }

        let state = engine.snapshot();
        let reply = IpcReply { rejected, state: &state };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

/// A simple house player: collect finished guests, seat bookings,
/// restock when short, donate the smallest preset when flush.
async fn run_autopilot(engine: &mut SessionEngine, ticks: u64) -> Result<()> {
    for _ in 0..ticks {
        engine.tick()?;

        let ready: Vec<_> = engine
            .scheduler()
            .slots()
            .iter()
            .filter(|s| s.is_ready(engine.clock.now_ms))
            .map(|s| s.id)
            .collect();
        for slot_id in ready {
            let _ = engine.submit(PlayerCommand::CompleteService { slot_id });
        }

        if let Some(booking) = engine.bookings().first() {
            let booking_id = booking.id.clone();
            let resource = engine
                .config()
                .catalog
                .get(&booking.service_id, engine.stats().tier_of(&booking.service_id))
                .and_then(|d| d.requirements.keys().next().cloned());
            if engine.submit(PlayerCommand::AcceptBooking { booking_id }).is_err() {
                if let Some(resource) = resource {
                    let _ = engine.submit(PlayerCommand::PurchaseInventory { resource });
                }
            }
        } else {
            let _ = engine.submit(PlayerCommand::RefreshBookings);
        }

        let money = engine.stats().money;
        if let Some(&preset) = engine.config().community.donation_presets.first() {
            if money > 3_000 {
                let _ = engine.submit(PlayerCommand::Donate { amount: preset });
            }
        }

        engine.flush_advisories().await?;
    }
    Ok(())
}

fn print_summary(engine: &SessionEngine, ticks: u64) -> Result<()> {
    let snapshot = engine.snapshot();
    let stats = &snapshot.stats;

    println!("=== SESSION SUMMARY ===");
    println!("  session_id:     {}", snapshot.session_id);
    println!("  ticks run:      {ticks}");
    println!("  final tick:     {}", snapshot.tick);
    println!("  money:          {}", stats.money);
    println!("  eco score:      {}", stats.eco_score);
    println!("  reputation:     {}", stats.reputation);
    println!("  donated:        {}", stats.total_donated);
    println!("  completed:      {}", engine.store_event_count("service_completed")?);
    println!("  shocks:         {}", engine.store_event_count("shock_applied")?);
    println!("  revenue:        {}", engine.store_journal_total(JournalCategory::ServiceRevenue)?);
    println!();

    println!("=== NATIONAL PARK ===");
    println!(
        "  fund:           {}/{} ({:.1}%)",
        snapshot.community.stats.project_current,
        snapshot.community.stats.project_goal,
        snapshot.community.progress_pct
    );
    for (rank, peer) in snapshot.community.leaderboard.iter().enumerate() {
        println!("  #{} {} {:<16} {:>6}", rank + 1, peer.avatar, peer.name, peer.score);
    }
    println!();

    println!("=== MENTOR ===");
    println!("  {}", snapshot.advisory_text);
    if let Some(event) = &snapshot.current_event {
        println!("  last event: {} ({})", event.title, event.concept);
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
