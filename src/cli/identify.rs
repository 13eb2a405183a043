use std::path::Path;

use anyhow::{Context, Result};
use warp_agent::identity;

pub fn run(artifact: &Path) -> Result<()> {
    let resolved = identity::resolve_path(artifact)
        .with_context(|| format!("Cannot identify {}", artifact.display()))?;
    let json = serde_json::to_string_pretty(&resolved).context("Failed to serialize identity")?;
    println!("{}", json);
    Ok(())
}
