use anyhow::{bail, Context};
use elif_migrator::{
    display_version, AutoDecider, DatabasePool, DatabasePoolConfig, MigrationContext, MigrationFinder,
    Migrator, MigratorConfig, PostgresPool, RunDecider, Runner, SqlVersionStore, UnitRegistry,
    UnitStatus, Version, VersionStore,
};
use inquire::Confirm;
use std::path::Path;
use std::sync::Arc;

use crate::interactive::PromptDecider;
use crate::output;

/// Load the configuration file, falling back to defaults when it is absent
pub fn load_config(path: &Path) -> anyhow::Result<MigratorConfig> {
    if path.exists() {
        return MigratorConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    tracing::info!("{} not found, using default configuration", path.display());
    let config = MigratorConfig::default();
    config.validate()?;
    Ok(config)
}

async fn connect(config: &MigratorConfig) -> anyhow::Result<Arc<dyn DatabasePool>> {
    let url = config.database_url()?;
    let pool_config = DatabasePoolConfig {
        max_connections: config.database.max_connections,
        ..DatabasePoolConfig::default()
    };

    let pool = PostgresPool::connect(&url, &pool_config)
        .await
        .context("Failed to connect to the database")?;
    Ok(Arc::new(pool))
}

fn version_store(
    config: &MigratorConfig,
    pool: &Arc<dyn DatabasePool>,
) -> anyhow::Result<Arc<SqlVersionStore>> {
    Ok(Arc::new(SqlVersionStore::new(
        Arc::clone(pool),
        &config.database.version_table,
    )?))
}

async fn build_migrator(config: &MigratorConfig) -> anyhow::Result<Migrator> {
    let pool = connect(config).await?;
    let store = version_store(config, &pool)?;

    let context = MigrationContext::new(Arc::clone(&pool), &config.base_path);
    let finder = MigrationFinder::new(
        &config.base_path,
        config.migrations.clone(),
        UnitRegistry::default(),
        context,
    )?;
    let units = finder.find_configured()?;
    tracing::debug!("Discovered {} migration(s)", units.len());

    Ok(Migrator::new(store).with_units(units))
}

fn parse_versions(tokens: &[String]) -> anyhow::Result<Vec<Version>> {
    tokens
        .iter()
        .map(|token| Version::parse(token).map_err(anyhow::Error::from))
        .collect()
}

pub async fn list(config: &MigratorConfig) -> anyhow::Result<()> {
    let mut migrator = build_migrator(config).await?;
    let pending: Vec<_> = migrator
        .pending_units()
        .await?
        .into_iter()
        .map(|unit| unit.info())
        .collect();

    if pending.is_empty() {
        output::success("Database is up to date");
        return Ok(());
    }

    output::heading(&format!("{} pending migration(s)", pending.len()));
    output::pending_table(&pending);
    Ok(())
}

pub async fn status(config: &MigratorConfig) -> anyhow::Result<()> {
    let mut migrator = build_migrator(config).await?;
    let states = migrator.status().await?;
    let current = migrator.current_version().await?;

    output::heading(&format!("Current version: {}", display_version(current.as_ref())));
    output::status_table(&states, UnitStatus::NotNeeded);
    Ok(())
}

pub async fn history(config: &MigratorConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let store = version_store(config, &pool)?;
    store.ensure_schema().await?;

    let entries = store.history().await?;
    if entries.is_empty() {
        output::success("The version log is empty");
        return Ok(());
    }
    output::history_table(&entries);
    Ok(())
}

pub async fn up(
    config: &MigratorConfig,
    yes: bool,
    interactive: bool,
    continue_on_error: bool,
) -> anyhow::Result<()> {
    let mut migrator = build_migrator(config).await?;
    let pending: Vec<_> = migrator
        .pending_units()
        .await?
        .into_iter()
        .map(|unit| unit.info())
        .collect();

    if pending.is_empty() {
        output::success("Database is up to date");
        return Ok(());
    }

    let mut decider: Box<dyn RunDecider> = if interactive {
        Box::new(PromptDecider::new())
    } else {
        if !yes {
            output::pending_table(&pending);
            let confirmed = Confirm::new(&format!("Apply {} pending migration(s)?", pending.len()))
                .with_default(false)
                .prompt()
                .context("Failed to get confirmation")?;
            if !confirmed {
                output::warning("Nothing applied");
                return Ok(());
            }
        }

        if continue_on_error {
            Box::new(AutoDecider::continue_on_error())
        } else {
            Box::new(AutoDecider::stop_on_error())
        }
    };

    let summary = Runner::run(&mut migrator, decider.as_mut()).await?;
    output::run_summary(&summary);

    if summary.has_errors() {
        bail!("{} migration(s) failed", summary.count(UnitStatus::Error));
    }
    Ok(())
}

pub async fn down(config: &MigratorConfig, versions: &[String]) -> anyhow::Result<()> {
    let versions = parse_versions(versions)?;
    let mut migrator = build_migrator(config).await?;

    let pending = migrator.pending_versions().await?;
    for version in versions.iter().filter(|version| !pending.contains(version)) {
        output::warning(&format!("Migration {} is not in the pending set, skipping", version));
    }

    let report = migrator.down(&versions).await?;
    output::apply_report(&report);

    if report.has_errors() {
        bail!("Reverting failed for some migrations");
    }
    Ok(())
}
