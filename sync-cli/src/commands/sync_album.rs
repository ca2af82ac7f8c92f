//! Resynchronize one album.

use albumsync_client::{PhotoApi, SyncEngine, SyncOutcome};
use albumsync_types::FolderPath;
use anyhow::{Context, Result};
use std::io::Write;

use super::describe;

/// Run the sync-album command.
///
/// When `folder` is given it is loaded first, so the album is reported as it
/// appears in that folder after the sync.
pub async fn run<A: PhotoApi>(
    engine: &SyncEngine<A>,
    album_id: &str,
    folder: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(folder) = folder {
        let path = FolderPath::new(folder);
        engine
            .load_path(path.clone())
            .await
            .with_context(|| format!("Failed to load {path}"))?;
    }

    let outcome = engine
        .sync_album(album_id)
        .await
        .with_context(|| format!("Failed to sync album {album_id}"))?;

    report(out, &outcome)?;
    Ok(())
}

/// Print what a sync achieved.
pub fn report(out: &mut impl Write, outcome: &SyncOutcome) -> std::io::Result<()> {
    writeln!(
        out,
        "Synced {} photos in \"{}\"",
        outcome.result.synced_count, outcome.result.album_name
    )?;
    if let Some(album) = &outcome.album {
        writeln!(out, "  {}", describe(album))?;
    }
    if !outcome.context_preserved {
        writeln!(out, "  Folder could not be reloaded; returned to /")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use albumsync_client::EventBus;
    use albumsync_types::{AlbumSyncResult, FolderListing, TreeNode};

    #[tokio::test]
    async fn sync_reports_album_in_its_folder() {
        let api = demo::photo_api();
        let engine = SyncEngine::new(api.clone(), EventBus::new());
        engine.load_path("/Trips/Italy").await.unwrap();

        // Service now has more photos for Rome
        api.set_listing(
            "/Trips/Italy",
            FolderListing::new(vec![TreeNode::album("A123", "Rome", "/Trips/Italy", 25)], vec![]),
        );
        api.set_sync_result(
            "A123",
            AlbumSyncResult {
                synced_count: 15,
                album_name: "Rome".into(),
            },
        );

        let mut out = Vec::new();
        run(&engine, "A123", None, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Synced 15 photos in \"Rome\""));
        assert!(text.contains("Rome (25 photos)"));
        assert_eq!(engine.current_path(), FolderPath::new("/Trips/Italy"));
    }

    #[tokio::test]
    async fn sync_failure_names_the_album() {
        let api = demo::photo_api();
        api.fail_next_sync("service down");
        let engine = SyncEngine::new(api, EventBus::new());

        let mut out = Vec::new();
        let err = run(&engine, "A123", Some("/Trips/Italy"), &mut out)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("A123"));
        assert!(out.is_empty());
    }
}
