// Headless demo: one companion in an in-memory world.
//
// Builds a small grass-topped world with a tree, a few animals and a chest
// stocked for a hut, then runs the companion for a fixed number of ticks.
// Chat lines from the script are turned into intents on a separate "parser"
// thread and reach the companion through its intent channel, the same way a
// language front end would deliver them. The companion's reports go to the
// `tracing` log; a JSON status snapshot is printed every few hundred ticks.
//
// Usage: sandbox [--config FILE] [--ticks N] [--seed N] [--status-every N]
//                [--say TICK:TEXT]...
//
// Log verbosity follows `RUST_LOG` (default `info`).
//
// See also: `companion.rs` (the dispatcher being driven), `sandbox.rs` (the
// world, navigator and storage used here), `intent.rs`.

use companion_core::blueprint::resolve_blueprint;
use companion_core::companion::Companion;
use companion_core::config::CompanionConfig;
use companion_core::host::{AnimalSpecies, TickContext, TracingReporter, World};
use companion_core::intent::{Intent, IntentSender};
use companion_core::inventory::AgentBody;
use companion_core::items::ItemStack;
use companion_core::prng::GameRng;
use companion_core::sandbox::{GridWorld, MemoryStorageNetwork, StepNavigator};
use companion_core::types::{Block, OreKind, VoxelCoord, WoodSpecies};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use tracing_subscriber::EnvFilter;

const GROUND_Y: i32 = 10;

struct SandboxArgs {
    config: Option<PathBuf>,
    ticks: u64,
    seed: u64,
    status_every: u64,
    script: Vec<(u64, String)>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args = parse_args();
    let config = match &args.config {
        Some(path) => match CompanionConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => CompanionConfig::default(),
    };

    let agent = VoxelCoord::new(24, GROUND_Y + 1, 24);
    let mut world = demo_world();
    stock_chest(&mut world, VoxelCoord::new(22, GROUND_Y + 1, 24));
    let mut nav = StepNavigator::new();
    let mut body = AgentBody::new(agent);
    let mut storage = MemoryStorageNetwork::default();
    let mut reporter = TracingReporter;
    let mut rng = GameRng::new(args.seed);

    let (mut companion, intents) = Companion::new(config);
    let (chat_tx, parser) = spawn_parser(intents);

    let mut script = args.script.into_iter().peekable();
    for tick in 0..args.ticks {
        while let Some((_, text)) = script.next_if(|(at, _)| *at <= tick) {
            tracing::info!(tick, %text, "user says");
            if chat_tx.send(text).is_err() {
                tracing::warn!("parser thread is gone");
            }
        }

        let mut ctx = TickContext {
            tick,
            world: &mut world,
            nav: &mut nav,
            body: &mut body,
            storage: &mut storage,
            reporter: &mut reporter,
            rng: &mut rng,
        };
        companion.tick(&mut ctx);
        nav.advance(&mut body);
        world.advance_tick();

        if args.status_every > 0 && tick % args.status_every == 0 {
            match serde_json::to_string(&companion.status()) {
                Ok(json) => println!("[{tick}] {json}"),
                Err(err) => tracing::warn!(%err, "status not serializable"),
            }
        }
        // Give the parser thread a chance to deliver between ticks.
        thread::yield_now();
    }

    drop(chat_tx);
    if parser.join().is_err() {
        tracing::warn!("parser thread panicked");
    }
    println!(
        "final position {}, {} oak logs, {} placed blocks in the world",
        body.position,
        body.inventory.count(companion_core::items::ItemKind::Block(Block::Log(WoodSpecies::Oak))),
        world.count_blocks(Block::Planks(WoodSpecies::Oak)),
    );
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

fn demo_world() -> GridWorld {
    let mut w = GridWorld::new(48, 32, 48);
    w.fill(VoxelCoord::new(0, 0, 0), VoxelCoord::new(47, GROUND_Y - 3, 47), Block::Stone);
    w.fill(
        VoxelCoord::new(0, GROUND_Y - 2, 0),
        VoxelCoord::new(47, GROUND_Y - 1, 47),
        Block::Dirt,
    );
    w.fill(VoxelCoord::new(0, GROUND_Y, 0), VoxelCoord::new(47, GROUND_Y, 47), Block::GrassBlock);

    let trunk = VoxelCoord::new(30, GROUND_Y + 1, 20);
    w.fill(trunk.offset(-2, 4, -2), trunk.offset(2, 6, 2), Block::Leaves(WoodSpecies::Oak));
    for dy in 0..5 {
        w.set_block(trunk.offset(0, dy, 0), Block::Log(WoodSpecies::Oak));
    }

    for x in 10..16 {
        w.set_block(VoxelCoord::new(x, GROUND_Y + 1, 30), Block::TallGrass);
    }
    w.set_block(
        VoxelCoord::new(12, GROUND_Y - 4, 12),
        Block::Ore {
            kind: OreKind::Iron,
            deep: false,
        },
    );

    w.add_animal(AnimalSpecies::Cow, VoxelCoord::new(34, GROUND_Y + 1, 30));
    w.add_animal(AnimalSpecies::Chicken, VoxelCoord::new(16, GROUND_Y + 1, 36));
    w
}

/// A chest holding exactly what the hut blueprint needs.
fn stock_chest(world: &mut GridWorld, pos: VoxelCoord) {
    world.set_block(pos, Block::Chest);
    let Ok(plan) = resolve_blueprint("hut") else {
        return;
    };
    if let Some(chest) = world.container_mut(pos) {
        for (&kind, &count) in plan.required() {
            if let Some(left) = chest.add_item(ItemStack::new(kind, count)) {
                tracing::warn!(?left, "chest full");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parser thread
// ---------------------------------------------------------------------------

/// Stand-in for the language front end: receives chat text, sends intents.
fn spawn_parser(intents: IntentSender) -> (mpsc::Sender<String>, thread::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<String>();
    let handle = thread::spawn(move || {
        for text in rx {
            if let Some(intent) = parse_chat(&text) {
                if !intents.send(intent) {
                    break;
                }
            }
        }
    });
    (tx, handle)
}

/// `gather <block words> [count]`, `build <blueprint> [x y z]`, or a bare
/// verb such as `survive` or `stop`.
fn parse_chat(text: &str) -> Option<Intent> {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let verb = words.remove(0).to_ascii_lowercase();
    let intent = match verb.as_str() {
        "gather" | "mine" | "collect" => {
            let count = words.last().and_then(|w| w.parse::<u32>().ok());
            if count.is_some() {
                words.pop();
            }
            let block = words.join(" ");
            let mut intent = Intent::new(verb.as_str())
                .with("block", block.as_str())
                .with_message(format!("Okay, getting {block}."));
            if let Some(count) = count {
                intent = intent.with("count", count.to_string());
            }
            intent
        }
        "build" => {
            let mut intent = Intent::new(verb.as_str());
            if let Some(name) = words.first() {
                intent = intent.with("blueprint", *name);
            }
            if words.len() == 4 {
                intent = intent.with("origin", words[1..].join(" "));
            }
            intent
        }
        _ => Intent::new(verb.as_str()),
    };
    Some(intent)
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

fn parse_args() -> SandboxArgs {
    let mut parsed = SandboxArgs {
        config: None,
        ticks: 3000,
        seed: 7,
        status_every: 250,
        script: Vec::new(),
    };
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                parsed.config = Some(PathBuf::from(value(&args, i, "--config")));
            }
            "--ticks" => {
                i += 1;
                parsed.ticks = number(&args, i, "--ticks");
            }
            "--seed" => {
                i += 1;
                parsed.seed = number(&args, i, "--seed");
            }
            "--status-every" => {
                i += 1;
                parsed.status_every = number(&args, i, "--status-every");
            }
            "--say" => {
                i += 1;
                let raw = value(&args, i, "--say");
                let Some((at, text)) = raw.split_once(':').and_then(|(t, s)| Some((t.parse().ok()?, s))) else {
                    eprintln!("--say expects TICK:TEXT");
                    std::process::exit(1);
                };
                parsed.script.push((at, text.trim().to_owned()));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    if parsed.script.is_empty() {
        parsed.script = vec![
            (0, "gather oak 4".to_owned()),
            (800, "build hut 20 11 30".to_owned()),
        ];
    }
    parsed.script.sort_by_key(|(at, _)| *at);
    parsed
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i) {
        Some(v) => v,
        None => {
            eprintln!("{flag} requires a value");
            std::process::exit(1);
        }
    }
}

fn number(args: &[String], i: usize, flag: &str) -> u64 {
    value(args, i, flag).parse().unwrap_or_else(|_| {
        eprintln!("{flag} requires a number");
        std::process::exit(1);
    })
}

fn print_usage() {
    eprintln!("Usage: sandbox [--config FILE] [--ticks N] [--seed N] [--status-every N] [--say TICK:TEXT]...");
    eprintln!("  --say 0:'gather iron 3'   queue a chat line for tick 0 (repeatable)");
}
