//! List one folder.

use albumsync_client::{PhotoApi, SyncEngine};
use albumsync_types::FolderPath;
use anyhow::{Context, Result};
use std::io::Write;

use super::render_listing;

/// Run the ls command.
pub async fn run<A: PhotoApi>(engine: &SyncEngine<A>, path: &str, out: &mut impl Write) -> Result<()> {
    let path = FolderPath::new(path);
    let outcome = engine
        .load_path(path.clone())
        .await
        .with_context(|| format!("Failed to load {path}"))?;

    render_listing(out, &outcome.path, &outcome.entry)?;
    Ok(())
}
