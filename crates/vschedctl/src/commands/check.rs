use std::path::Path;

use anyhow::{Context, Result};
use vsched_core::PoolSettings;

/// Load and validate a pool settings file.
pub fn check(pool: &str) -> Result<()> {
    let settings = PoolSettings::from_file(Path::new(pool))
        .with_context(|| format!("loading pool settings {pool}"))?;

    println!("✓ {}/{} is valid", settings.namespace, settings.name);
    println!("  pod capacity:        {}", settings.pod_capacity);
    println!("  refresh period:      {:?}", settings.refresh_period()?);
    println!("  scale cache refresh: {:?}", settings.scale_cache_refresh_period()?);
    Ok(())
}
