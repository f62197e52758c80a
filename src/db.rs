use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the SQLite store inside the index directory.
pub const INDEX_FILE_NAME: &str = "index.sqlite3";

pub fn index_path(index_dir: &Path) -> PathBuf {
    index_dir.join(INDEX_FILE_NAME)
}

/// Open (creating if needed) the index store under `index_dir`.
pub async fn connect(index_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(index_dir)?;
    let db_path = index_path(index_dir);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
