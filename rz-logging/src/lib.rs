//! rz-logging: NDJSON events, run manifests and an opt-in debug log.
//!
//! Event logs are append-only NDJSON so a crashed run still leaves every completed line readable.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run manifest schema version.
pub const RUN_MANIFEST_VERSION: u32 = 1;

/// Environment variable enabling `debug_event` output.
pub const DEBUG_ENV_VAR: &str = "RZ_DEBUG_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifestV1 {
    pub run_manifest_version: u32,

    pub run_id: String,
    pub created_ts_ms: u64,

    // Hashes for reproducibility.
    pub git_hash: Option<String>,
    pub config_hash: Option<String>,

    pub logs_dir: String,
    pub env_id: String,
    pub ranked_rewards: bool,

    // Counters.
    pub episodes_completed: u64,
    pub nodes_expanded: u64,
}

pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}

pub fn hash_config_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn try_git_hash() -> Option<String> {
    use std::process::Command;

    let out = Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

pub fn read_manifest(path: impl AsRef<Path>) -> Result<RunManifestV1, NdjsonError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice::<RunManifestV1>(&bytes)?)
}

pub fn write_manifest_atomic(path: impl AsRef<Path>, m: &RunManifestV1) -> Result<(), NdjsonError> {
    let path = path.as_ref();
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(m)?;
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicySummaryV1 {
    pub entropy: f32,
    pub max_p: f32,
    pub argmax_a: u32,
}

impl PolicySummaryV1 {
    /// Entropy (nats), max probability and first argmax of a distribution.
    pub fn from_policy(policy: &[f32]) -> Self {
        let mut entropy = 0.0f32;
        let mut max_p = f32::NEG_INFINITY;
        let mut argmax_a = 0u32;
        for (a, &p) in policy.iter().enumerate() {
            if p > 0.0 {
                entropy -= p * p.ln();
            }
            if p > max_p {
                max_p = p;
                argmax_a = a as u32;
            }
        }
        Self {
            entropy,
            max_p: if max_p.is_finite() { max_p } else { 0.0 },
            argmax_a,
        }
    }
}

/// One planner decision on the real trajectory.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,

    pub run_id: String,
    pub episode_id: u64,
    pub ply: u32,

    pub chosen_action: u32,
    pub root_visits: u32,
    pub nodes_expanded: u64,
    pub step_reward: f32,

    pub policy: PolicySummaryV1,
}

/// One finished episode.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,

    pub run_id: String,
    pub episode_id: u64,

    pub steps: u32,
    pub total_reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub nodes_expanded: u64,
    /// Ranked-rewards threshold after the episode, if the wrapper is active.
    pub rr_threshold: Option<f32>,
}

#[derive(Debug, Error)]
pub enum NdjsonError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only NDJSON writer.
///
/// Contract: each call writes exactly one JSON object followed by a newline.
pub struct NdjsonWriter {
    w: BufWriter<File>,
    lines_since_flush: u64,
    flush_every_lines: u64,
}

impl NdjsonWriter {
    /// Open a file for append. Creates it if it doesn't exist.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, NdjsonError> {
        Self::open_append_with_flush(path, 0)
    }

    /// `flush_every_lines=0` disables periodic flushing.
    pub fn open_append_with_flush(
        path: impl AsRef<Path>,
        flush_every_lines: u64,
    ) -> Result<Self, NdjsonError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            w: BufWriter::new(f),
            lines_since_flush: 0,
            flush_every_lines,
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<(), NdjsonError> {
        let mut buf = serde_json::to_vec(event)?;
        buf.push(b'\n');
        self.w.write_all(&buf)?;
        self.lines_since_flush += 1;
        if self.flush_every_lines > 0 && self.lines_since_flush >= self.flush_every_lines {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), NdjsonError> {
        self.w.flush()?;
        self.lines_since_flush = 0;
        Ok(())
    }
}

pub fn debug_enabled() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| {
        matches!(
            std::env::var(DEBUG_ENV_VAR).as_deref(),
            Ok("1" | "true" | "yes")
        )
    })
}

/// Write one JSON debug line to stderr when `RZ_DEBUG_LOG` is set. No-op otherwise.
pub fn debug_event(location: &str, message: &str, data: serde_json::Value) {
    if !debug_enabled() {
        return;
    }
    let payload = debug_payload(location, message, data);
    if let Ok(line) = serde_json::to_string(&payload) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{line}");
    }
}

fn debug_payload(location: &str, message: &str, data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "ts_ms": now_ms(),
        "location": location,
        "message": message,
        "data": data,
    })
}
