use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Comma-separated list; blank entries dropped.
fn profiled_env_list(profile: &str, key: &str) -> Vec<String> {
    profiled_env_opt(profile, key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub watch: WatchConfig,
    pub reader: ReaderConfig,
    pub compliance: ComplianceConfig,
    pub update: UpdateConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MRQA_PROFILE`. When set (e.g. `MRRC`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("MRQA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            watch: WatchConfig::from_env_profiled(p),
            reader: ReaderConfig::from_env_profiled(p),
            compliance: ComplianceConfig::from_env_profiled(p),
            update: UpdateConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!("  storage:     db_url={}", self.storage.db_url);
        tracing::info!(
            "  watch:       dirs={:?}, template_refresh={}s, station_idle={}s",
            self.watch.dirs,
            self.watch.template_refresh_secs,
            self.watch.station_idle_secs
        );
        tracing::info!("  reader:      cmd={}", self.reader.command);
        tracing::info!(
            "  compliance:  rules_file={}, allow_null={:?}",
            self.compliance
                .rules_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(built-in)".to_string()),
            self.compliance.allow_null
        );
        tracing::info!("  update:      scan_root={}", self.update.scan_root.display());
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8080),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sqlx connection URL, e.g. `sqlite://db.sqlite` or `sqlite::memory:`.
    pub db_url: String,
    pub max_connections: u32,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            db_url: profiled_env_or(p, "MRQA_DB_URL", "sqlite://db.sqlite"),
            max_connections: profiled_env_u32(p, "MRQA_DB_MAX_CONNECTIONS", 1),
        }
    }
}

// ── Live watch ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub dirs: Vec<PathBuf>,
    /// How often the live loop recomputes templates from history.
    pub template_refresh_secs: u64,
    /// Forget stations idle this long (0 = keep until restart).
    pub station_idle_secs: u64,
    /// Capacity of the file-event queue between watcher and monitor.
    pub event_queue: usize,
}

impl WatchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dirs: profiled_env_list(p, "MRQA_WATCH_DIRS")
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            template_refresh_secs: profiled_env_u64(p, "MRQA_TEMPLATE_REFRESH_SECS", 300),
            station_idle_secs: profiled_env_u64(p, "MRQA_STATION_IDLE_SECS", 0),
            event_queue: profiled_env_u32(p, "MRQA_EVENT_QUEUE", 256) as usize,
        }
    }
}

// ── Header reader ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// External header-dump command; receives the file path as last argument.
    pub command: String,
    /// Optional `taglist.txt` overriding the built-in column order.
    pub taglist: Option<PathBuf>,
}

impl ReaderConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            command: profiled_env_or(p, "MRQA_READER_CMD", "dcmmeta2tsv"),
            taglist: profiled_env_opt(p, "MRQA_TAGLIST").map(PathBuf::from),
        }
    }
}

// ── Compliance ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// YAML file with comparison rules (built-in rules when unset).
    pub rules_file: Option<PathBuf>,
    /// Extra fields allowed to be missing in realtime headers.
    pub allow_null: Vec<String>,
}

impl ComplianceConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_file: profiled_env_opt(p, "MRQA_RULES_FILE").map(PathBuf::from),
            allow_null: profiled_env_list(p, "MRQA_ALLOW_NULL"),
        }
    }
}

// ── Batch update ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Directory holding one subdirectory per project.
    pub scan_root: PathBuf,
    /// Log headers instead of writing them.
    pub dry_run: bool,
}

impl UpdateConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            scan_root: PathBuf::from(profiled_env_or(p, "MRQA_SCAN_ROOT", "/disk/mace2/scan_data")),
            dry_run: profiled_env_opt(p, "DRYRUN").is_some(),
        }
    }
}
