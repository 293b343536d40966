use crate::store::keys;
use crate::store::operations::settings::Settings;
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

/// 按顺序排列；版本号即下标 + 1，只追加不修改
const MIGRATIONS: &[(&str, MigrationFn)] = &[
    ("001_initial", m001_initial),
    ("002_default_settings", m002_default_settings),
];

pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Brings the store up to `latest_version()`.
///
/// A crash between a migration and its version bump re-runs that
/// migration on the next start, so each step must be idempotent.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let applied = get_current_version(store)?;
    let pending = MIGRATIONS.iter().zip(1u32..).filter(|(_, v)| *v > applied);

    for ((name, step), version) in pending {
        tracing::info!(version, name, "Applying migration");
        step(store)?;
        set_version(store, version)?;
    }
    tracing::debug!(version = latest_version(), "Store schema up to date");
    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    let Some(raw) = store.meta.get(VERSION_KEY.as_bytes())? else {
        return Ok(0);
    };
    let bytes = <[u8; 4]>::try_from(raw.as_ref()).map_err(|_| StoreError::Migration {
        version: 0,
        message: format!("version marker has {} bytes, expected 4", raw.len()),
    })?;
    Ok(u32::from_be_bytes(bytes))
}

/// Versions only move forward.
pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("store is at version {current}, cannot go back to {version}"),
        });
    }
    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

fn m002_default_settings(store: &Store) -> Result<(), StoreError> {
    if store.settings.get(keys::SETTINGS_KEY.as_bytes())?.is_none() {
        store.save_settings(&Settings::default())?;
    }
    Ok(())
}
