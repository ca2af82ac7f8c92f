//! Local state management for albumsync.

use albumsync_client::ClientConfig;
use albumsync_types::ClientId;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "albumsync.toml";

const CLIENT_ID_FILE: &str = "client_id";

/// Load the client configuration.
///
/// An explicitly named file must exist; the default file is optional.
pub fn load_client_config(explicit: Option<&Path>) -> Result<(PathBuf, ClientConfig)> {
    match explicit {
        Some(path) => {
            let config = ClientConfig::from_file(path)?;
            Ok((path.to_path_buf(), config))
        }
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            let config = ClientConfig::load_or_default(&path)?;
            Ok((path, config))
        }
    }
}

/// Read the persisted client identifier, if any.
pub async fn read_client_id(data_dir: &Path) -> Result<Option<ClientId>> {
    let path = data_dir.join(CLIENT_ID_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = tokio::fs::read_to_string(&path)
        .await
        .context("Failed to read client id")?;
    let id = ClientId::parse(contents.trim())
        .with_context(|| format!("Invalid client id in {}", path.display()))?;
    Ok(Some(id))
}

/// Return the persisted client identifier, generating one on first use.
pub async fn load_or_create_client_id(data_dir: &Path) -> Result<ClientId> {
    if let Some(id) = read_client_id(data_dir).await? {
        return Ok(id);
    }

    let id = ClientId::generate();
    let path = data_dir.join(CLIENT_ID_FILE);
    tokio::fs::write(&path, id.as_str())
        .await
        .context("Failed to save client id")?;
    tracing::info!(client_id = %id, "generated client id");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn client_id_is_created_once() {
        let dir = tempdir().unwrap();
        assert!(read_client_id(dir.path()).await.unwrap().is_none());

        let first = load_or_create_client_id(dir.path()).await.unwrap();
        let second = load_or_create_client_id(dir.path()).await.unwrap();

        assert_eq!(first, second);
        assert!(dir.path().join("client_id").exists());
    }

    #[tokio::test]
    async fn corrupt_client_id_is_an_error() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("client_id"), "not a/valid id")
            .await
            .unwrap();

        assert!(load_or_create_client_id(dir.path()).await.is_err());
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(load_client_config(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_config_is_parsed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("albumsync.toml");
        std::fs::write(&path, "[api]\nbase_url = \"http://photos.test\"\n").unwrap();

        let (loaded_from, config) = load_client_config(Some(&path)).unwrap();
        assert_eq!(loaded_from, path);
        assert_eq!(config.api.base_url, "http://photos.test");
    }
}
