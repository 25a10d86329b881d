//! Reel CLI

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use reel::{CassetteStore, ScopeFilter};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Reel v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: reel <command> <cassette> [options]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  inspect <cassette>                       Show cassette contents");
        eprintln!("  prune <cassette> --exclude <scope>...    Remove entries for scopes");
        process::exit(1);
    }

    let command = args[1].as_str();
    let cassette = PathBuf::from(&args[2]);

    let result = match command {
        "inspect" => inspect(&cassette),
        "prune" => prune(&cassette, &args[3..]),
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'reel' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let entries = CassetteStore::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let mut scopes: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &entries {
        *scopes.entry(entry.scope.as_str()).or_default() += 1;
    }

    println!("Cassette: {}", path.display());
    println!("Entries:  {}", entries.len());
    println!();

    for (scope, count) in &scopes {
        println!("{scope} ({count})");
    }

    println!();
    for entry in &entries {
        println!(
            "  {} {} {} {} -> {}",
            entry.id(),
            entry.method,
            entry.scope,
            entry.path,
            entry.status
        );
    }

    Ok(())
}

fn prune(path: &Path, args: &[String]) -> anyhow::Result<()> {
    let mut excluded = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--exclude" => match iter.next() {
                Some(scope) => excluded.push(scope.clone()),
                None => bail!("--exclude requires a scope"),
            },
            other => bail!("Unknown option: {other}"),
        }
    }

    if excluded.is_empty() {
        bail!("prune requires at least one --exclude <scope>");
    }

    let entries = CassetteStore::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let before = entries.len();

    let kept = ScopeFilter::new(&excluded).apply(entries);
    CassetteStore::persist(path, &kept)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "Removed {} of {} entries from {}",
        before - kept.len(),
        before,
        path.display()
    );

    Ok(())
}
