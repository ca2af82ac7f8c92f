//! Interactive folder browser.
//!
//! Reads one command per line:
//!
//! - `ls`: show the current folder
//! - `cd <name|id>`: enter a folder listed here
//! - `up`: go back to the previous folder
//! - `root`: jump to the top
//! - `sync <album-id>`: resync an album and reload the folder in place
//! - `refresh`: reload the current folder from the service
//! - `quit`

use albumsync_client::{LoadOutcome, PhotoApi, RevalidationOutcome, SyncEngine};
use albumsync_types::FolderPath;
use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{folder_path, render_listing, sync_album};

/// A parsed browser command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the current folder.
    List,
    /// Enter a child folder by name or id.
    Enter(String),
    /// Go back.
    Up,
    /// Jump to the root.
    Root,
    /// Resync an album.
    Sync(String),
    /// Reload from the service.
    Refresh,
    /// Print usage.
    Help,
    /// Leave the browser.
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest = words.collect::<Vec<_>>().join(" ");

        let command = match (verb, rest.is_empty()) {
            ("ls", true) => Self::List,
            ("cd", false) => Self::Enter(rest),
            ("cd", true) => return Err("usage: cd <name|id>".to_string()),
            ("up" | "..", true) => Self::Up,
            ("root", true) => Self::Root,
            ("sync", false) => Self::Sync(rest),
            ("sync", true) => return Err("usage: sync <album-id>".to_string()),
            ("refresh", true) => Self::Refresh,
            ("help" | "?", true) => Self::Help,
            ("quit" | "exit" | "q", true) => Self::Quit,
            _ => return Err(format!("unknown command: {}", line.trim())),
        };
        Ok(Some(command))
    }
}

const HELP: &str = "commands: ls, cd <name|id>, up, root, sync <album-id>, refresh, quit";

/// Run the browser until `quit` or end of input.
pub async fn run<A, R>(engine: &SyncEngine<A>, input: R, out: &mut impl Write) -> Result<()>
where
    A: PhotoApi,
    R: AsyncBufRead + Unpin,
{
    let outcome = engine
        .load_path(FolderPath::root())
        .await
        .context("Failed to load the root folder")?;
    show(engine, out, outcome).await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                writeln!(out, "{usage}")?;
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = execute(engine, command, out).await {
            writeln!(out, "error: {e:#}")?;
        }
    }
    Ok(())
}

async fn execute<A: PhotoApi>(
    engine: &SyncEngine<A>,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::List => {
            let outcome = engine.load_path(engine.current_path()).await?;
            show(engine, out, outcome).await?;
        }
        Command::Enter(target) => {
            let current = engine.current_path();
            let entry = engine
                .cached(&current)
                .with_context(|| format!("{current} is not loaded"))?;
            let node = entry
                .nodes
                .iter()
                .find(|n| n.id == target || n.name.eq_ignore_ascii_case(&target))
                .with_context(|| format!("no entry named {target} in {current}"))?;
            if !node.is_folder() {
                anyhow::bail!("{} is an album; use `sync {}`", node.name, node.id);
            }
            let outcome = engine.descend(folder_path(&current, node)).await?;
            show(engine, out, outcome).await?;
        }
        Command::Up => {
            let outcome = engine.ascend().await?;
            show(engine, out, outcome).await?;
        }
        Command::Root => {
            let outcome = engine.jump_to_root().await?;
            show(engine, out, outcome).await?;
        }
        Command::Sync(album_id) => {
            let outcome = engine.sync_album(&album_id).await?;
            sync_album::report(out, &outcome)?;
            if let Some(entry) = engine.cached(&engine.current_path()) {
                render_listing(out, &engine.current_path(), &entry)?;
            }
        }
        Command::Refresh => {
            let outcome = engine.refresh().await?;
            show(engine, out, outcome).await?;
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => {}
    }
    Ok(())
}

/// Print a loaded folder, then its revalidated version if it changed.
async fn show<A: PhotoApi>(
    engine: &SyncEngine<A>,
    out: &mut impl Write,
    outcome: LoadOutcome,
) -> Result<()> {
    render_listing(out, &outcome.path, &outcome.entry)?;

    let Some(revalidation) = outcome.revalidation else {
        return Ok(());
    };
    if revalidation.wait().await == RevalidationOutcome::Updated {
        if let Some(entry) = engine.cached(&outcome.path) {
            writeln!(out, "(updated)")?;
            render_listing(out, &outcome.path, &entry)?;
        }
    }
    Ok(())
}
