//! Input status overview for `rfp status`.
//!
//! Shows, for each persisted input of the pipeline, whether it is empty or
//! ready and what the next `rfp ingest` will do about it. Nothing is fetched
//! or opened.

use anyhow::Result;
use std::path::PathBuf;

use crate::cache;
use crate::config::Config;
use crate::index::storage_is_empty;

/// One line of the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputStatus {
    pub name: &'static str,
    pub path: PathBuf,
    pub ready: bool,
    /// Whether the matching source section is configured (caches only).
    pub configured: Option<bool>,
    pub next_ingest: &'static str,
}

/// Compute the status of both caches and the index storage.
pub fn input_status(config: &Config) -> Vec<InputStatus> {
    let paths = &config.paths;
    let manual_ready = !cache::is_empty(&paths.manual_cache);
    let requirements_ready = !cache::is_empty(&paths.requirements_cache);
    let storage_ready = !storage_is_empty(&paths.index_dir);

    let cache_action = |ready: bool| if ready { "reuse" } else { "fetch and normalize" };

    // Any refreshed cache wipes the storage before the build.
    let index_action = if !manual_ready || !requirements_ready || !storage_ready {
        "rebuild"
    } else {
        "reopen"
    };

    vec![
        InputStatus {
            name: "manual",
            path: paths.manual_cache.clone(),
            ready: manual_ready,
            configured: Some(config.sources.manual.is_some()),
            next_ingest: cache_action(manual_ready),
        },
        InputStatus {
            name: "requirements",
            path: paths.requirements_cache.clone(),
            ready: requirements_ready,
            configured: Some(config.sources.requirements.is_some()),
            next_ingest: cache_action(requirements_ready),
        },
        InputStatus {
            name: "index",
            path: paths.index_dir.clone(),
            ready: storage_ready,
            configured: None,
            next_ingest: index_action,
        },
    ]
}

pub fn run_status(config: &Config) -> Result<()> {
    println!(
        "{:<14} {:<8} {:<12} {:<22} PATH",
        "INPUT", "STATE", "CONFIGURED", "NEXT INGEST"
    );
    for s in input_status(config) {
        let configured = match s.configured {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };
        println!(
            "{:<14} {:<8} {:<12} {:<22} {}",
            s.name,
            if s.ready { "ready" } else { "empty" },
            configured,
            s.next_ingest,
            s.path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::minimal();
        config.paths.manual_cache = dir.join("manual.json");
        config.paths.requirements_cache = dir.join("requirements.json");
        config.paths.index_dir = dir.join("index");
        config
    }

    #[test]
    fn fresh_workspace_rebuilds_everything() {
        let tmp = TempDir::new().unwrap();
        let status = input_status(&config_in(tmp.path()));
        assert!(status.iter().all(|s| !s.ready));
        assert_eq!(status[0].next_ingest, "fetch and normalize");
        assert_eq!(status[2].next_ingest, "rebuild");
    }

    #[test]
    fn ready_inputs_are_reused() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        std::fs::write(&config.paths.manual_cache, "[]").unwrap();
        std::fs::write(&config.paths.requirements_cache, "[]").unwrap();
        std::fs::create_dir_all(&config.paths.index_dir).unwrap();
        std::fs::write(config.paths.index_dir.join("index.sqlite3"), "x").unwrap();

        let status = input_status(&config);
        assert!(status.iter().all(|s| s.ready));
        assert_eq!(status[0].next_ingest, "reuse");
        assert_eq!(status[2].next_ingest, "reopen");
    }

    #[test]
    fn one_empty_cache_forces_rebuild() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        std::fs::write(&config.paths.manual_cache, "[]").unwrap();
        std::fs::create_dir_all(&config.paths.index_dir).unwrap();
        std::fs::write(config.paths.index_dir.join("index.sqlite3"), "x").unwrap();

        let status = input_status(&config);
        assert!(!status[1].ready);
        assert_eq!(status[2].next_ingest, "rebuild");
    }
}
