//! Inspection and maintenance CLI for a file-backed chat session store.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use btv_chat::chat::{ChatStoreConfig, FileStorage, SessionStore, TokioScheduler};
use btv_chat::telemetry::init_tracing;

const USAGE: &str = "usage: btv-chat <storage-dir> <list|report|prune [budget-bytes]|export>";

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    List,
    Report,
    Prune(Option<usize>),
    Export,
}

fn parse_args(args: &[String]) -> CliResult<(PathBuf, Command)> {
    let [dir, command, rest @ ..] = args else {
        return Err(USAGE.into());
    };
    let command = match (command.as_str(), rest) {
        ("list", []) => Command::List,
        ("report", []) => Command::Report,
        ("export", []) => Command::Export,
        ("prune", []) => Command::Prune(None),
        ("prune", [budget]) => Command::Prune(Some(budget.parse()?)),
        _ => return Err(USAGE.into()),
    };
    Ok((PathBuf::from(dir), command))
}

fn run(dir: PathBuf, command: Command, runtime: &tokio::runtime::Runtime) -> CliResult<()> {
    let mut config = ChatStoreConfig::default();
    if let Command::Prune(Some(budget)) = command {
        config = config.with_eviction_budget(budget);
    }

    let backend = Arc::new(FileStorage::open(&dir)?);
    let scheduler = Arc::new(TokioScheduler::new(runtime.handle().clone()));
    let mut store = SessionStore::open(config, backend, scheduler)?;
    let mut out = io::stdout().lock();

    match command {
        Command::List => {
            for session in store.sessions() {
                writeln!(
                    out,
                    "{} {}  {}  {:>3} msgs  {:<7} {}",
                    if session.is_pinned { "*" } else { " " },
                    session.id,
                    session.created_at.format("%Y-%m-%d %H:%M"),
                    session.messages.len(),
                    session.agent_mode.map_or("-", |mode| mode.as_str()),
                    session.title
                )?;
            }
        }
        Command::Report => {
            let report = store.storage_report()?;
            writeln!(out, "{report}")?;
            writeln!(
                out,
                "budget {} KiB",
                store.config().eviction_budget_bytes / 1024
            )?;
        }
        Command::Prune(_) => {
            let report = store.evict_oldest_unpinned_until_under_budget();
            store.flush_now()?;
            writeln!(
                out,
                "removed {} sessions ({} -> {} bytes, budget {})",
                report.removed.len(),
                report.before_bytes,
                report.after_bytes,
                report.budget_bytes
            )?;
        }
        Command::Export => {
            let json = serde_json::to_string_pretty(&store.sessions())?;
            writeln!(out, "{json}")?;
        }
    }

    store.close()?;
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (dir, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(2);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = run(dir, command, &runtime) {
        tracing::error!("{e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_args() {
        let (dir, command) = parse_args(&args(&["/tmp/store", "list"])).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/store"));
        assert_eq!(command, Command::List);

        let (_, prune) = parse_args(&args(&["d", "prune", "1024"])).unwrap();
        assert_eq!(prune, Command::Prune(Some(1024)));

        assert!(parse_args(&args(&["d"])).is_err());
        assert!(parse_args(&args(&["d", "prune", "lots"])).is_err());
        assert!(parse_args(&args(&["d", "explode"])).is_err());
    }
}
