//! HippoGraph: build and query a graph-augmented retrieval index.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hippograph_core::HippoGraphConfig;
use hippograph_engine::HippoGraph;

mod passages;

fn resolve_data_dir() -> PathBuf {
    std::env::var("HIPPOGRAPH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn load_config(data_dir: &Path) -> anyhow::Result<HippoGraphConfig> {
    match std::env::var("HIPPOGRAPH_CONFIG") {
        Ok(path) => {
            let mut config = HippoGraphConfig::from_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e))?;
            config.save_dir = data_dir.to_path_buf();
            Ok(config)
        }
        Err(_) => Ok(HippoGraphConfig::from_env(data_dir)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_help() {
    println!("HippoGraph: graph-augmented passage retrieval");
    println!();
    println!("Usage: hippograph <command> [args]");
    println!();
    println!("Commands:");
    println!("  index <file>...              Index blank-line separated passages ('-' for stdin)");
    println!("  query [--top-k N] <text>...  Retrieve passages for each query");
    println!("  delete <chunk-id>...         Delete passages and reclaim orphaned nodes");
    println!("  stats                        Show store and graph statistics");
    println!("  help                         Show this help message");
    println!();
    println!("Environment:");
    println!("  HIPPOGRAPH_DATA_DIR          Index directory (default: data)");
    println!("  HIPPOGRAPH_CONFIG            JSON config file (otherwise HIPPOGRAPH_* overrides)");
    println!("  RUST_LOG                     Log filter (default: info)");
}

/// Split `--top-k N` out of the query arguments.
fn parse_query_args(args: &[String]) -> anyhow::Result<(Vec<String>, Option<usize>)> {
    let mut queries = Vec::new();
    let mut top_k = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        if arg == "--top-k" || arg == "-k" {
            let value = it
                .next()
                .ok_or_else(|| anyhow::anyhow!("--top-k needs a value"))?;
            top_k = Some(
                value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid --top-k value: {}", value))?,
            );
        } else {
            queries.push(arg.clone());
        }
    }
    Ok((queries, top_k))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_help();
        std::process::exit(1);
    };
    let rest = &args[2..];

    if matches!(command.as_str(), "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());
    let config = load_config(&data_dir)?;

    let open = |config: HippoGraphConfig| {
        HippoGraph::open(config).map_err(|e| anyhow::anyhow!("Failed to open index: {}", e))
    };

    match command.as_str() {
        "index" => {
            if rest.is_empty() {
                eprintln!("Usage: hippograph index <file>...");
                std::process::exit(1);
            }
            let passages = passages::read_passages(rest)?;
            let mut engine = open(config)?;
            let report = engine.index(&passages)?;
            print_json(&report)?;
        }
        "query" => {
            let (queries, top_k) = parse_query_args(rest)?;
            if queries.is_empty() {
                eprintln!("Usage: hippograph query [--top-k N] <text>...");
                std::process::exit(1);
            }
            let mut engine = open(config)?;
            let solutions = engine.retrieve(&queries, top_k)?;
            print_json(&solutions)?;
        }
        "delete" => {
            if rest.is_empty() {
                eprintln!("Usage: hippograph delete <chunk-id>...");
                std::process::exit(1);
            }
            let mut engine = open(config)?;
            let report = engine.delete(rest)?;
            print_json(&report)?;
        }
        "stats" => {
            let engine = open(config)?;
            print_json(&engine.stats()?)?;
        }
        _ => {
            eprintln!("Unknown command: {}. Use 'hippograph help' for usage.", command);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_query_args() {
        let (queries, top_k) =
            parse_query_args(&strings(&["who founded acme", "--top-k", "3", "where"])).unwrap();
        assert_eq!(queries, strings(&["who founded acme", "where"]));
        assert_eq!(top_k, Some(3));
    }

    #[test]
    fn test_parse_query_args_rejects_bad_top_k() {
        assert!(parse_query_args(&strings(&["q", "--top-k"])).is_err());
        assert!(parse_query_args(&strings(&["q", "--top-k", "many"])).is_err());
    }

    #[test]
    fn test_load_config_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.save_dir, dir.path());
    }
}
