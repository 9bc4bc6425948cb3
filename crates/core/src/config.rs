use std::env;

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

/// Well-known env keys that identify a profile when prefixed.
const PROFILE_MARKER_KEYS: &[&str] = &["PG_HOST", "OPENAI_API_KEY", "ANTHROPIC_API_KEY", "SQS_QUEUE_URL"];

/// Environment-only configuration. Every key may be overridden per-profile
/// via `{KB_PROFILE}_{KEY}`, falling back to the bare key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub profile: String,
    pub queue: QueueConfig,
    pub postgres: PostgresConfig,
    pub monitor: MonitorConfig,
    pub notifier: NotifierConfig,
    pub scheduler: SchedulerConfig,
    pub worker: WorkerConfig,
    pub fetch: FetchConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `KB_PROFILE`.
    pub fn from_env() -> Self {
        let profile = env_or("KB_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            queue: QueueConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            monitor: MonitorConfig::from_env_profiled(p),
            notifier: NotifierConfig::from_env_profiled(p),
            scheduler: SchedulerConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
            fetch: FetchConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            embedding: EmbeddingConfig::from_env_profiled(p),
        }
    }

    /// Discover available profiles by scanning env vars for `{PREFIX}_{MARKER_KEY}` patterns.
    pub fn available_profiles() -> Vec<String> {
        let mut profiles = std::collections::BTreeSet::new();
        profiles.insert("default".to_string());
        for (key, _) in env::vars() {
            for marker in PROFILE_MARKER_KEYS {
                if let Some(prefix) = key.strip_suffix(&format!("_{}", marker)) {
                    if !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    {
                        profiles.insert(prefix.to_string());
                    }
                }
            }
        }
        profiles.into_iter().collect()
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    pub fn log_summary(&self) {
        tracing::info!("config loaded (profile: {})", self.profile_label());
        tracing::info!("  queue:      backend={}", self.queue.backend);
        tracing::info!("  postgres:   host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!("  notifier:   mode={}, quiet={}..{}", self.notifier.mode, self.notifier.quiet_start_hour, self.notifier.quiet_end_hour);
        tracing::info!("  scheduler:  cadence_secs={}", self.scheduler.cadence_secs);
        tracing::info!("  llm:        provider={}", self.llm.provider);
        tracing::info!("  embedding:  provider={}, dims={}", self.embedding.provider, self.embedding.dimensions);
    }

    /// Redacted view safe for logs — never includes secrets (DSNs, API keys).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "queue": { "backend": self.queue.backend, "pop_timeout_secs": self.queue.pop_timeout_secs },
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "configured": self.postgres.is_configured(),
            },
            "monitor": {
                "failover_log_path": self.monitor.failover_log_path,
                "batch_max_rows": self.monitor.batch_max_rows,
                "batch_max_interval_secs": self.monitor.batch_max_interval_secs,
            },
            "notifier": {
                "mode": self.notifier.mode,
                "quiet_start_hour": self.notifier.quiet_start_hour,
                "quiet_end_hour": self.notifier.quiet_end_hour,
            },
            "scheduler": { "cadence_secs": self.scheduler.cadence_secs, "seed_list_path": self.scheduler.seed_list_path },
            "worker": { "pop_timeout_secs": self.worker.pop_timeout_secs, "max_fetch_bytes": self.fetch.max_bytes },
            "llm": { "provider": self.llm.provider, "configured": self.llm.is_configured() },
            "embedding": { "provider": self.embedding.provider, "dimensions": self.embedding.dimensions },
        })
    }
}

// ── Queue ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// "sqs" or "memory" (in-process, for tests/dev)
    pub backend: String,
    pub sqs_queue_url: Option<String>,
    pub aws_region: String,
    pub pop_timeout_secs: u64,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: profiled_env_or(p, "QUEUE_BACKEND", "memory"),
            sqs_queue_url: profiled_env_opt(p, "SQS_QUEUE_URL"),
            aws_region: profiled_env_or(p, "AWS_REGION", "ap-southeast-1"),
            pop_timeout_secs: profiled_env_u64(p, "WORKER_POP_TIMEOUT_SECS", 5),
        }
    }
}

// ── PostgreSQL (Fingerprint Index + Atom Store) ──────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "kb_ingestion"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Monitor ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub failover_log_path: String,
    pub queue_capacity: usize,
    pub batch_max_rows: usize,
    pub batch_max_interval_secs: u64,
    /// Fraction of failover-written rows over a rolling 100-row window above
    /// which `degraded` is surfaced.
    pub degraded_fraction_threshold: f64,
}

impl MonitorConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            failover_log_path: profiled_env_or(p, "MONITOR_FAILOVER_LOG_PATH", "data/session_metrics_failover.jsonl"),
            queue_capacity: profiled_env_u32(p, "MONITOR_QUEUE_CAPACITY", 1000) as usize,
            batch_max_rows: profiled_env_u32(p, "MONITOR_BATCH_MAX_ROWS", 50) as usize,
            batch_max_interval_secs: profiled_env_u64(p, "MONITOR_BATCH_MAX_INTERVAL_SECS", 5),
            degraded_fraction_threshold: profiled_env_or(p, "MONITOR_DEGRADED_FRACTION", "0.1")
                .parse()
                .unwrap_or(0.1),
        }
    }
}

// ── Notifier ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// "verbose" or "batch"
    pub mode: String,
    pub webhook_url: Option<String>,
    pub chat_id: Option<String>,
    pub quiet_start_hour: u8,
    pub quiet_end_hour: u8,
    pub batch_cadence_secs: u64,
    pub batch_buffer_capacity: usize,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_60s: u32,
    pub failed_sends_log_path: String,
}

impl NotifierConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            mode: profiled_env_or(p, "NOTIFY_MODE", "batch").to_lowercase(),
            webhook_url: profiled_env_opt(p, "NOTIFY_WEBHOOK_URL"),
            chat_id: profiled_env_opt(p, "NOTIFY_CHAT_ID"),
            quiet_start_hour: profiled_env_u32(p, "NOTIFY_QUIET_START_HOUR", 23) as u8,
            quiet_end_hour: profiled_env_u32(p, "NOTIFY_QUIET_END_HOUR", 7) as u8,
            batch_cadence_secs: profiled_env_u64(p, "NOTIFY_BATCH_CADENCE_SECS", 300),
            batch_buffer_capacity: profiled_env_u32(p, "NOTIFY_BATCH_BUFFER_CAPACITY", 1000) as usize,
            rate_limit_capacity: profiled_env_u32(p, "NOTIFY_RATE_LIMIT_CAPACITY", 20),
            rate_limit_refill_per_60s: profiled_env_u32(p, "NOTIFY_RATE_LIMIT_REFILL_PER_60S", 20),
            failed_sends_log_path: profiled_env_or(p, "NOTIFY_FAILED_SENDS_LOG_PATH", "data/failed_sends.jsonl"),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub cadence_secs: u64,
    pub seed_list_path: String,
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            cadence_secs: profiled_env_u64(p, "SCHEDULER_CADENCE_SECS", 4 * 60 * 60),
            seed_list_path: profiled_env_or(p, "SCHEDULER_SEED_LIST_PATH", "config/seed_urls.txt"),
        }
    }
}

// ── Worker ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub pop_timeout_secs: u64,
    pub shutdown_drain_timeout_secs: u64,
    pub generation_concurrency: usize,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            pop_timeout_secs: profiled_env_u64(p, "WORKER_POP_TIMEOUT_SECS", 5),
            shutdown_drain_timeout_secs: profiled_env_u64(p, "WORKER_SHUTDOWN_DRAIN_TIMEOUT_SECS", 60),
            generation_concurrency: profiled_env_u32(p, "WORKER_GENERATION_CONCURRENCY", 1) as usize,
        }
    }
}

// ── Fetch ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub max_bytes: u64,
    pub total_timeout_secs: u64,
    pub user_agent: String,
}

impl FetchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_bytes: profiled_env_u64(p, "FETCH_MAX_BYTES", 50 * 1024 * 1024),
            total_timeout_secs: profiled_env_u64(p, "FETCH_TIMEOUT_SECS", 60),
            user_agent: profiled_env_or(p, "FETCH_USER_AGENT", "kb-ingestion-core/0.1"),
        }
    }
}

// ── LLM (Atom Generator's reasoning model) ───────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai", "anthropic", "ollama"
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "ollama"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            anthropic_model: profiled_env_or(p, "ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            ollama_url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            ollama_model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0.1").parse().unwrap_or(0.1),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 4096),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "anthropic" => self.anthropic_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

// ── Embedding ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama", "openai"
    pub provider: String,
    pub dimensions: u32,
    pub batch_size: u32,
    pub cache_capacity: usize,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
}

impl EmbeddingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "EMBEDDING_PROVIDER", "ollama"),
            dimensions: profiled_env_u32(p, "EMBEDDING_DIMENSIONS", 768),
            batch_size: profiled_env_u32(p, "EMBEDDING_BATCH_SIZE", 64),
            cache_capacity: profiled_env_u32(p, "EMBEDDING_CACHE_CAPACITY", 10_000) as usize,
            max_retries: profiled_env_u32(p, "EMBEDDING_MAX_RETRIES", 3),
            backoff_base_secs: profiled_env_u64(p, "EMBEDDING_BACKOFF_BASE_SECS", 1),
            backoff_cap_secs: profiled_env_u64(p, "EMBEDDING_BACKOFF_CAP_SECS", 10),
            ollama_url: profiled_env_or(p, "EMBEDDING_OLLAMA_URL", "http://localhost:11434"),
            ollama_model: profiled_env_or(p, "EMBEDDING_OLLAMA_MODEL", "nomic-embed-text"),
            openai_api_key: profiled_env_opt(p, "EMBEDDING_OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "EMBEDDING_OPENAI_MODEL", "text-embedding-3-small"),
            openai_base_url: profiled_env_opt(p, "EMBEDDING_OPENAI_BASE_URL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        // SAFETY: test-only env manipulation, single-threaded within this crate's test binary.
        unsafe {
            std::env::remove_var("KB_PROFILE");
        }
        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        assert_eq!(cfg.notifier.quiet_start_hour, 23);
        assert_eq!(cfg.notifier.quiet_end_hour, 7);
        assert_eq!(cfg.embedding.dimensions, 768);
        assert_eq!(cfg.scheduler.cadence_secs, 4 * 60 * 60);
    }

    #[test]
    fn profiled_override_wins_over_bare_key() {
        unsafe {
            std::env::set_var("PG_HOST", "bare-host");
            std::env::set_var("TEST1_PG_HOST", "profiled-host");
        }
        let cfg = Config::for_profile("TEST1");
        assert_eq!(cfg.postgres.host, "profiled-host");
        unsafe {
            std::env::remove_var("PG_HOST");
            std::env::remove_var("TEST1_PG_HOST");
        }
    }

    #[test]
    fn redacted_summary_omits_secrets() {
        unsafe {
            std::env::set_var("PG_PASSWORD", "super-secret");
        }
        let cfg = Config::for_profile("");
        let json = cfg.redacted_summary();
        let rendered = json.to_string();
        assert!(!rendered.contains("super-secret"));
        unsafe {
            std::env::remove_var("PG_PASSWORD");
        }
    }
}
