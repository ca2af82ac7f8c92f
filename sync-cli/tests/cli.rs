use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn albumsync(data_dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("albumsync");
    cmd.arg("--data-dir")
        .arg(data_dir.path())
        .current_dir(data_dir.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn mock_ls_lists_root() {
    let temp = TempDir::new().unwrap();

    albumsync(&temp)
        .args(["--mock", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[folder] trips    Trips (1 items)"))
        .stdout(predicate::str::contains("Favourites (42 photos)"));
}

#[test]
fn mock_ls_unknown_folder_fails() {
    let temp = TempDir::new().unwrap();

    albumsync(&temp)
        .args(["--mock", "ls", "/Nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load /Nowhere"));
}

#[test]
fn mock_browse_walks_the_tree() {
    let temp = TempDir::new().unwrap();

    albumsync(&temp)
        .args(["--mock", "browse"])
        .write_stdin("cd Trips\ncd Italy\nsync A123\nup\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("/Trips/Italy  (Home / Trips / Italy)"))
        .stdout(predicate::str::contains("Synced 10 photos in \"Rome\""));
}

#[test]
fn mock_sync_album_in_folder() {
    let temp = TempDir::new().unwrap();

    albumsync(&temp)
        .args(["--mock", "sync-album", "A124", "--folder", "/Trips/Italy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Florence (8 photos)"));
}

#[test]
fn mock_chat_persists_client_id() {
    let temp = TempDir::new().unwrap();

    albumsync(&temp)
        .args(["--mock", "chat", "hello", "--session", "conv-1", "--wait", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sent: hello"))
        .stdout(predicate::str::contains("received: hello"));

    let id = std::fs::read_to_string(temp.path().join("client_id")).unwrap();
    assert!(id.starts_with("client_"));

    albumsync(&temp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(id.trim()));
}

#[test]
fn status_reads_config_file() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("custom.toml");
    std::fs::write(&config, "[api]\nbase_url = \"http://photos.test:9000\"\n").unwrap();

    albumsync(&temp)
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("http://photos.test:9000"))
        .stdout(predicate::str::contains("not yet created"));
}

#[test]
fn missing_explicit_config_fails() {
    let temp = TempDir::new().unwrap();

    albumsync(&temp)
        .args(["--config", "absent.toml", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}
