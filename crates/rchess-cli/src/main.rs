use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use rchess_core::{EngineConfig, GameClock, Position, SearchCoordinator, SearchLimits, SearchResult};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Search a chess position and print the best move")]
struct Cli {
    /// Position in FEN (default: start position)
    #[arg(long)]
    fen: Option<String>,

    /// Moves in UCI notation played from the position before searching
    #[arg(long, num_args = 1..)]
    moves: Vec<String>,

    /// Maximum depth (adaptive when omitted)
    #[arg(long)]
    depth: Option<u32>,

    /// Fixed time for this move (ms)
    #[arg(long)]
    movetime: Option<u64>,

    /// Remaining clock time of the side to move (ms)
    #[arg(long)]
    clock_ms: Option<u64>,

    /// Clock increment per move (ms)
    #[arg(long, default_value_t = 0)]
    inc_ms: u64,

    /// Node limit per search thread
    #[arg(long)]
    nodes: Option<u64>,

    /// Search threads (overrides the config file)
    #[arg(long)]
    threads: Option<usize>,

    /// Transposition table size in MB (overrides the config file)
    #[arg(long)]
    hash: Option<usize>,

    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Hard deadline for the whole request (ms); the search is cancelled when it passes
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(hash) = cli.hash {
        config.hash_mb = hash;
    }
    config.validate().context("invalid engine configuration")?;

    if cli.print_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let pos = build_position(&cli)?;
    let limits = build_limits(&cli)?;
    info!("searching {}", pos.fen());

    let coordinator = SearchCoordinator::new(config).context("failed to start search")?;
    let result = match cli.deadline_ms {
        Some(ms) => {
            let deadline = Duration::from_millis(ms);
            let mut handle = coordinator.find_best_move_async(pos.clone(), limits)?;
            match handle.wait_timeout(deadline) {
                Ok(result) => result,
                Err(err) => {
                    info!("{err}, cancelling");
                    handle.cancel();
                    handle.wait()?
                }
            }
        }
        None => {
            let mut pos = pos.clone();
            coordinator.find_best_move(&mut pos, &limits)
        }
    };
    coordinator.cleanup();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result_json(&result))?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn build_position(cli: &Cli) -> Result<Position> {
    let mut pos = match &cli.fen {
        Some(fen) => Position::from_fen(fen)?,
        None => Position::startpos(),
    };
    for uci in &cli.moves {
        let Some(mv) = pos.parse_uci(uci) else {
            bail!("illegal move {uci} in {}", pos.fen());
        };
        pos.do_move(mv)?;
    }
    Ok(pos)
}

fn build_limits(cli: &Cli) -> Result<SearchLimits> {
    if cli.depth == Some(0) {
        bail!("--depth must be >= 1");
    }
    let mut builder = SearchLimits::builder();
    if let Some(depth) = cli.depth {
        builder = builder.depth(depth);
    }
    if let Some(ms) = cli.movetime {
        builder = builder.fixed_time_ms(ms);
    }
    if let Some(remaining_ms) = cli.clock_ms {
        builder = builder.clock(GameClock {
            remaining_ms,
            increment_ms: cli.inc_ms,
            moves_to_go: None,
        });
    }
    if let Some(nodes) = cli.nodes {
        builder = builder.nodes(nodes);
    }
    Ok(builder.build())
}

fn print_result(result: &SearchResult) {
    let stats = &result.stats;
    let pv: Vec<String> = stats.pv.iter().map(ToString::to_string).collect();
    println!(
        "info depth {} seldepth {} score cp {} nodes {} nps {} time {} pv {}",
        result.depth,
        stats.seldepth,
        result.score,
        stats.nodes,
        stats.nps(),
        stats.elapsed.as_millis(),
        pv.join(" ")
    );
    match result.best_move {
        Some(mv) => println!("bestmove {mv}"),
        None => println!("bestmove (none)"),
    }
}

fn result_json(result: &SearchResult) -> serde_json::Value {
    let stats = &result.stats;
    json!({
        "best_move": result.best_move.map(|mv| mv.to_string()),
        "score": result.score,
        "mate": result.is_mate(),
        "depth": result.depth,
        "engine": result.engine,
        "source": format!("{:?}", result.source),
        "pv": stats.pv.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "stats": {
            "nodes": stats.nodes,
            "qnodes": stats.qnodes,
            "elapsed_ms": stats.elapsed.as_millis() as u64,
            "nps": stats.nps(),
            "seldepth": stats.seldepth,
            "iterations": stats.iterations,
            "tt_hits": stats.tt_hits,
            "aspiration_failures": stats.aspiration_failures,
            "null_cuts": stats.null_cuts,
            "lmr_count": stats.lmr_count,
            "lmr_researches": stats.lmr_researches,
            "futility_prunes": stats.futility_prunes,
            "razor_cuts": stats.razor_cuts,
            "strategy_fallbacks": stats.strategy_fallbacks,
            "ordering": stats.ordering,
        },
    })
}
