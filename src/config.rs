//! Configuration loaded from environment variables with defaults.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

/// Which Order Store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Scylla,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StoreBackend::Memory),
            "scylla" => Ok(StoreBackend::Scylla),
            other => bail!("unknown store backend {:?} (expected memory|scylla)", other),
        }
    }
}

/// Which broker carries the events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    Memory,
    Redpanda,
}

impl FromStr for BrokerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(BrokerBackend::Memory),
            "redpanda" | "kafka" => Ok(BrokerBackend::Redpanda),
            other => bail!("unknown broker backend {:?} (expected memory|redpanda)", other),
        }
    }
}

/// Roles this process hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    pub order: bool,
    pub assembly: bool,
    pub notification: bool,
}

impl Roles {
    pub fn all() -> Self {
        Self {
            order: true,
            assembly: true,
            notification: true,
        }
    }
}

impl FromStr for Roles {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut roles = Roles {
            order: false,
            assembly: false,
            notification: false,
        };

        for role in s.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            match role {
                "order" => roles.order = true,
                "assembly" => roles.assembly = true,
                "notification" => roles.notification = true,
                "all" => roles = Roles::all(),
                other => bail!("unknown role {:?} (expected order|assembly|notification|all)", other),
            }
        }

        if !(roles.order || roles.assembly || roles.notification) {
            bail!("no roles enabled");
        }
        Ok(roles)
    }
}

#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub nodes: Vec<String>,
    pub keyspace: String,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub backend: BrokerBackend,
    /// Comma-separated bootstrap servers
    pub brokers: String,
    pub order_paid_topic: String,
    pub ship_assembled_topic: String,
    pub assembly_group: String,
    pub completion_group: String,
    pub notification_paid_group: String,
    pub notification_assembled_group: String,
}

#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    pub min_build_seconds: u64,
    pub max_build_seconds: u64,
    /// Processed-order set in Redis; in-memory when absent
    pub redis_url: Option<String>,
    pub dedup_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: String,
    pub roles: Roles,
    pub store_backend: StoreBackend,
    pub scylla: ScyllaConfig,
    pub broker: BrokerConfig,
    pub inventory_addr: String,
    pub payment_addr: String,
    pub assembly: AssemblyConfig,
    /// Bound on every external call made while serving a request
    pub call_timeout: Duration,
    pub startup_attempts: u32,
    pub startup_backoff: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let number = |key: &str, default: u64| -> anyhow::Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw)),
                None => Ok(default),
            }
        };

        let keyspace = text("SCYLLA_KEYSPACE", "orders");
        if keyspace.is_empty() || !keyspace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("SCYLLA_KEYSPACE must be alphanumeric or underscore, got {:?}", keyspace);
        }

        let nodes: Vec<String> = text("SCYLLA_NODES", "127.0.0.1:9042")
            .split(',')
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        if nodes.is_empty() {
            bail!("SCYLLA_NODES must list at least one node");
        }

        let min_build_seconds = number("ASSEMBLY_MIN_BUILD_SECONDS", 1)?;
        let max_build_seconds = number("ASSEMBLY_MAX_BUILD_SECONDS", 10)?;
        if min_build_seconds > max_build_seconds {
            bail!(
                "ASSEMBLY_MIN_BUILD_SECONDS ({}) exceeds ASSEMBLY_MAX_BUILD_SECONDS ({})",
                min_build_seconds,
                max_build_seconds
            );
        }

        let startup_attempts = u32::try_from(number("STARTUP_ATTEMPTS", 5)?)
            .context("STARTUP_ATTEMPTS is out of range")?;
        if startup_attempts == 0 {
            bail!("STARTUP_ATTEMPTS must be at least 1");
        }

        let call_timeout_ms = number("CALL_TIMEOUT_MS", 5_000)?;
        if call_timeout_ms == 0 {
            bail!("CALL_TIMEOUT_MS must be positive");
        }

        Ok(Self {
            http_addr: text("HTTP_ADDR", "0.0.0.0:8080"),
            roles: text("ROLES", "all").parse().context("invalid ROLES")?,
            store_backend: text("STORE_BACKEND", "memory")
                .parse()
                .context("invalid STORE_BACKEND")?,
            scylla: ScyllaConfig { nodes, keyspace },
            broker: BrokerConfig {
                backend: text("BROKER", "memory").parse().context("invalid BROKER")?,
                brokers: text("KAFKA_BROKERS", "127.0.0.1:9092"),
                order_paid_topic: text("ORDER_PAID_TOPIC", "order.paid"),
                ship_assembled_topic: text("SHIP_ASSEMBLED_TOPIC", "ship.assembled"),
                assembly_group: text("ASSEMBLY_GROUP", "assembly-service"),
                completion_group: text("COMPLETION_GROUP", "order-service"),
                notification_paid_group: text("NOTIFICATION_PAID_GROUP", "notification-order-paid"),
                notification_assembled_group: text(
                    "NOTIFICATION_ASSEMBLED_GROUP",
                    "notification-ship-assembled",
                ),
            },
            inventory_addr: text("INVENTORY_GRPC_ADDR", "http://127.0.0.1:50051"),
            payment_addr: text("PAYMENT_GRPC_ADDR", "http://127.0.0.1:50052"),
            assembly: AssemblyConfig {
                min_build_seconds,
                max_build_seconds,
                redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
                dedup_ttl_seconds: number("DEDUP_TTL_SECONDS", 7 * 24 * 3600)?,
            },
            call_timeout: Duration::from_millis(call_timeout_ms),
            startup_attempts,
            startup_backoff: Duration::from_millis(number("STARTUP_BACKOFF_MS", 2_000)?),
            shutdown_timeout: Duration::from_secs(number("SHUTDOWN_TIMEOUT_SECONDS", 30)?),
        })
    }
}
