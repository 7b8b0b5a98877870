use std::{env, sync::Arc};

use anyhow::{bail, Context};
use kvdb::{BackendType, Db, DbConfig, PrefixDb, Registry};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: kvdb-node <backend> <dir> [name] [prefix]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvdb=debug"));
    tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_env_filter(env_filter)
        .init();

    let (config, prefix) = parse_args(env::args().skip(1))?;
    let registry = Registry::with_defaults();

    // Store calls block the current thread: keep them off the async workers.
    tokio::task::spawn_blocking(move || inspect(&registry, &config, prefix)).await?
}

/// Parses `<backend> <dir> [name] [prefix]`.
fn parse_args(
    mut args: impl Iterator<Item = String>,
) -> anyhow::Result<(DbConfig, Option<String>)> {
    let mut config = DbConfig {
        backend: args.next().context(USAGE)?.parse::<BackendType>()?,
        dir: args.next().context(USAGE)?.into(),
        ..Default::default()
    };

    if let Some(name) = args.next() {
        config.name = name;
    }
    let prefix = args.next();

    if args.next().is_some() {
        bail!(USAGE);
    }

    Ok((config, prefix))
}

/// Opens the configured store, logs its stats and dumps its entries, restricted to `prefix`
/// if given.
fn inspect(registry: &Registry, config: &DbConfig, prefix: Option<String>) -> anyhow::Result<()> {
    let db = registry
        .open_config(config)
        .with_context(|| format!("failed to open store `{}`", config.name))?;

    let view: Arc<dyn Db> = match prefix {
        Some(prefix) => Arc::new(PrefixDb::new(Arc::clone(&db), prefix)),
        None => Arc::clone(&db),
    };

    for (name, value) in view.stats() {
        info!(%name, %value, "Store stat");
    }

    let dumped = view.print().context("failed to dump the store");
    db.close()?;

    dumped
}
