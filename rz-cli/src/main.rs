//! rz: command line for ranked-rewards MCTS.
//!
//! Subcommands:
//! - selfplay
//! - warmup

use std::env;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rz_core::{Config, DiceRace, DiceRaceParams, Environment};
use rz_logging::NdjsonWriter;
use rz_mcts::{Mcts, MctsConfig, UniformModel};
use rz_ranked::RankedRewardsEnv;
use rz_runtime::{Episode, EpisodeLogs, EpisodeRunner, RunnerError};

const ENV_ID: &str = "dice_race_v1";

fn print_help() {
    eprintln!(
        r#"rz - ranked-rewards MCTS

USAGE:
    rz <COMMAND> [OPTIONS]

COMMANDS:
    selfplay            Play episodes with MCTS and log every decision
    warmup              Fill the ranked-rewards buffer with random episodes

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version

Run `rz <COMMAND> --help` for command options.
"#
    );
}

fn print_version() {
    println!("rz {}", env!("CARGO_PKG_VERSION"));
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i + 1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            eprintln!("Invalid {flag} value");
            process::exit(1);
        })
}

fn load_config(path: &str) -> Config {
    Config::load(path).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}");
        process::exit(1);
    })
}

fn cmd_selfplay(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut out: Option<String> = None;
    let mut episodes: Option<u32> = None;
    let mut seed: Option<u64> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"rz selfplay

USAGE:
    rz selfplay --config cfg.yaml --out runs/<id>/ [--episodes N] [--seed S]

OPTIONS:
    --config PATH    Path to YAML config (required)
    --out DIR        Output directory (required)
    --episodes N     Episodes to play (default: selfplay.episodes)
    --seed S         Search seed (default: selfplay.seed)
"#
                );
                return;
            }
            "--config" => {
                config_path = Some(args.get(i + 1).cloned().unwrap_or_default());
                i += 2;
            }
            "--out" => {
                out = Some(args.get(i + 1).cloned().unwrap_or_default());
                i += 2;
            }
            "--episodes" => {
                episodes = Some(parse_value(args, i, "--episodes"));
                i += 2;
            }
            "--seed" => {
                seed = Some(parse_value(args, i, "--seed"));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `rz selfplay`: {}", other);
                eprintln!("Run `rz selfplay --help` for usage.");
                process::exit(1);
            }
        }
    }

    let config_path = config_path.unwrap_or_else(|| {
        eprintln!("Missing --config");
        process::exit(1);
    });
    let out = out.unwrap_or_else(|| {
        eprintln!("Missing --out");
        process::exit(1);
    });

    let cfg = load_config(&config_path);
    let episodes = episodes.unwrap_or(cfg.selfplay.episodes);
    let seed = seed.unwrap_or(cfg.selfplay.seed);

    let logs_dir = PathBuf::from(&out).join("logs");
    std::fs::create_dir_all(&logs_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create logs dir: {e}");
        process::exit(1);
    });

    let run_json = PathBuf::from(&out).join("run.json");
    let config_bytes = std::fs::read(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to read config file: {e}");
        process::exit(1);
    });
    let run_id = PathBuf::from(&out)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&out)
        .to_string();
    let mut manifest = rz_logging::RunManifestV1 {
        run_manifest_version: rz_logging::RUN_MANIFEST_VERSION,
        run_id,
        created_ts_ms: rz_logging::now_ms(),
        git_hash: rz_logging::try_git_hash(),
        config_hash: Some(rz_logging::hash_config_bytes(&config_bytes)),
        logs_dir: "logs".to_string(),
        env_id: ENV_ID.to_string(),
        ranked_rewards: cfg.ranked_rewards.enabled,
        episodes_completed: 0,
        nodes_expanded: 0,
    };
    // Resume: keep identity and counters of an existing run.
    if let Ok(existing) = rz_logging::read_manifest(&run_json) {
        manifest.created_ts_ms = existing.created_ts_ms;
        manifest.run_id = existing.run_id;
        manifest.episodes_completed = existing.episodes_completed;
        manifest.nodes_expanded = existing.nodes_expanded;
    }
    write_manifest(&run_json, &manifest);

    let logs = open_logs(&logs_dir, &manifest.run_id);
    let mcts_cfg = MctsConfig::from(&cfg.mcts);
    // A resumed run continues the episode ids and draws fresh dice and search streams.
    let resumed = manifest.episodes_completed;
    let seed = seed.wrapping_add(resumed);
    let env = DiceRace::new(
        DiceRaceParams::from(&cfg.env),
        cfg.env.seed.wrapping_add(resumed),
    );
    let ids = resumed..resumed + u64::from(episodes);

    let result = if cfg.ranked_rewards.enabled {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let env = RankedRewardsEnv::from_config(env, &cfg.ranked_rewards, &mut rng)
            .unwrap_or_else(|e| {
                eprintln!("Failed to build ranked-rewards env: {e}");
                process::exit(1);
            });
        run_episodes(env, mcts_cfg, seed, &cfg, ids, logs, |e| {
            e.buffer().threshold()
        })
    } else {
        run_episodes(env, mcts_cfg, seed, &cfg, ids, logs, |_| None)
    };

    let (played, nodes) = match result {
        Ok(eps) => {
            print_summary(&eps);
            let nodes: u64 = eps.iter().map(|e| e.nodes_expanded).sum();
            (eps.len() as u64, nodes)
        }
        Err(e) => {
            eprintln!("Self-play failed: {e}");
            process::exit(1);
        }
    };

    manifest.episodes_completed += played;
    manifest.nodes_expanded += nodes;
    write_manifest(&run_json, &manifest);
}

fn open_logs(logs_dir: &Path, run_id: &str) -> EpisodeLogs {
    let open = |name: &str| {
        NdjsonWriter::open_append_with_flush(logs_dir.join(name), 100).unwrap_or_else(|e| {
            eprintln!("Failed to open {name}: {e}");
            process::exit(1);
        })
    };
    EpisodeLogs {
        run_id: run_id.to_string(),
        decisions: open("decisions.ndjson"),
        episodes: open("episodes.ndjson"),
    }
}

fn write_manifest(path: &Path, manifest: &rz_logging::RunManifestV1) {
    rz_logging::write_manifest_atomic(path, manifest).unwrap_or_else(|e| {
        eprintln!("Failed to write run manifest: {e}");
        process::exit(1);
    });
}

fn run_episodes<E: Environment>(
    env: E,
    mcts_cfg: MctsConfig,
    seed: u64,
    cfg: &Config,
    ids: Range<u64>,
    logs: EpisodeLogs,
    threshold: fn(&E) -> Option<f32>,
) -> Result<Vec<Episode>, RunnerError> {
    let mcts = Mcts::new(env, UniformModel, mcts_cfg, seed)?;
    let mut runner = EpisodeRunner::new(mcts, cfg.selfplay.max_decisions)
        .with_first_episode_id(ids.start)
        .with_logs(logs)
        .with_threshold(threshold);
    runner.play_episodes(ids.end - ids.start)
}

fn print_summary(eps: &[Episode]) {
    let n = eps.len().max(1) as f32;
    let mean_reward = eps.iter().map(|e| e.total_reward).sum::<f32>() / n;
    let mean_len = eps.iter().map(|e| e.len()).sum::<usize>() as f32 / n;
    let terminated = eps.iter().filter(|e| e.terminated).count();
    let nodes: u64 = eps.iter().map(|e| e.nodes_expanded).sum();

    println!("Self-play:");
    println!("  - Episodes: {}", eps.len());
    println!("  - Terminated: {}, truncated: {}", terminated, eps.len() - terminated);
    println!("  - Total reward: mean={:.4}", mean_reward);
    println!("  - Length: mean={:.2}", mean_len);
    println!("  - Nodes expanded: {}", nodes);
}

fn cmd_warmup(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut seed: Option<u64> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"rz warmup

USAGE:
    rz warmup --config cfg.yaml [--seed S]

OPTIONS:
    --config PATH    Path to YAML config (required)
    --seed S         Seed for the random episodes (default: selfplay.seed)
"#
                );
                return;
            }
            "--config" => {
                config_path = Some(args.get(i + 1).cloned().unwrap_or_default());
                i += 2;
            }
            "--seed" => {
                seed = Some(parse_value(args, i, "--seed"));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `rz warmup`: {}", other);
                eprintln!("Run `rz warmup --help` for usage.");
                process::exit(1);
            }
        }
    }

    let config_path = config_path.unwrap_or_else(|| {
        eprintln!("Missing --config");
        process::exit(1);
    });
    let cfg = load_config(&config_path);
    let seed = seed.unwrap_or(cfg.selfplay.seed);

    let mut rr = cfg.ranked_rewards.clone();
    rr.initialize_buffer = true;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let env = RankedRewardsEnv::from_config(DiceRace::from_config(&cfg.env), &rr, &mut rng)
        .unwrap_or_else(|e| {
            eprintln!("Warm start failed: {e}");
            process::exit(1);
        });

    let buffer = env.buffer();
    println!("Warm start:");
    println!("  - Episodes: {}", rr.num_init_rewards);
    println!("  - Buffer: {}/{}", buffer.len(), buffer.max_len());
    match buffer.threshold() {
        Some(t) => println!("  - Threshold (p{}): {:.4}", buffer.percentile(), t),
        None => println!("  - Threshold: none (empty buffer)"),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        process::exit(0);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => {
            print_help();
        }
        "-V" | "--version" => {
            print_version();
        }
        "selfplay" => {
            cmd_selfplay(&args[2..]);
        }
        "warmup" => {
            cmd_warmup(&args[2..]);
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Run `rz --help` for usage.");
            process::exit(1);
        }
    }
}
