//! Show configuration and local state.

use albumsync_client::ClientConfig;
use anyhow::Result;
use std::io::Write;
use std::path::Path;

use crate::config::read_client_id;

/// Run the status command.
pub async fn run(
    data_dir: &Path,
    config_path: &Path,
    config: &ClientConfig,
    mock: bool,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "=== albumsync status ===")?;
    writeln!(out)?;

    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", config_path.display())
    };
    writeln!(out, "Config: {source}")?;
    writeln!(out, "Mode:   {}", if mock { "mock (offline demo)" } else { "live" })?;
    writeln!(out)?;

    writeln!(out, "Photo API:")?;
    writeln!(out, "  URL:     {}", config.api.base_url)?;
    writeln!(out, "  Timeout: {} ms", config.api.timeout_ms)?;
    writeln!(out)?;

    let backoff = config.realtime.backoff();
    writeln!(out, "Realtime:")?;
    writeln!(out, "  URL:     {}", config.realtime.url)?;
    writeln!(
        out,
        "  Retry:   {} attempts, first after {} ms",
        backoff.max_attempts,
        backoff.base_delay.as_millis()
    )?;
    writeln!(out)?;

    writeln!(out, "Client:")?;
    writeln!(out, "  Data dir: {}", data_dir.display())?;
    match read_client_id(data_dir).await? {
        Some(id) => writeln!(out, "  ID:       {id}")?,
        None => writeln!(out, "  ID:       not yet created (run `albumsync chat` once)")?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_or_create_client_id;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_without_client_id() {
        let dir = tempdir().unwrap();
        let mut out = Vec::new();

        run(
            dir.path(),
            &dir.path().join("albumsync.toml"),
            &ClientConfig::default(),
            false,
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("not found, using defaults"));
        assert!(text.contains("http://localhost:8000"));
        assert!(text.contains("5 attempts, first after 1000 ms"));
        assert!(text.contains("not yet created"));
    }

    #[tokio::test]
    async fn status_shows_persisted_client_id() {
        let dir = tempdir().unwrap();
        let id = load_or_create_client_id(dir.path()).await.unwrap();
        let mut out = Vec::new();

        run(
            dir.path(),
            &dir.path().join("albumsync.toml"),
            &ClientConfig::default(),
            true,
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(id.as_str()));
        assert!(text.contains("mock (offline demo)"));
    }
}
