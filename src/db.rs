use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement, TransactionError};
use std::fs::{self, OpenOptions};
use std::path::Path;

use log::{debug, info};

use crate::config::AppConfig;
use crate::error::AppError;

const SCHEMA_SQL: &str = include_str!("../schema-sqlite.sql");

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config.database_url();
    ensure_sqlite_path(&url);
    let db = Database::connect(&url).await?;
    init_schema(&db).await?;
    Ok(db)
}

fn ensure_sqlite_path(url: &str) {
    let path = match url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    {
        Some(path) => path.split('?').next().unwrap_or(path),
        None => return,
    };
    if path.is_empty() || path.starts_with(":memory:") {
        return;
    }
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path);
}

/// Creates the tables on a fresh SQLite database. Other backends are expected
/// to be migrated out of band.
pub async fn init_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    if backend != sea_orm::DatabaseBackend::Sqlite {
        return Ok(());
    }
    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='t_user' LIMIT 1",
    );
    if db.query_one(exists_stmt).await?.is_some() {
        debug!("schema already present");
        return Ok(());
    }

    for stmt in split_sql(SCHEMA_SQL) {
        db.execute(Statement::from_string(backend, stmt)).await?;
    }
    info!("sqlite schema initialised");
    Ok(())
}

pub fn map_tx_error(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(e) => AppError::Storage(e),
        TransactionError::Transaction(e) => e,
    }
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sql_drops_comments_and_blank_statements() {
        let stmts = split_sql("-- header\nCREATE TABLE a (id INT);\n\n;CREATE INDEX i ON a (id);\n");
        assert_eq!(stmts, vec!["CREATE TABLE a (id INT)", "CREATE INDEX i ON a (id)"]);
    }

    #[test]
    fn schema_script_has_every_table() {
        let stmts = split_sql(SCHEMA_SQL);
        for table in ["t_user", "t_micropost", "t_relationship", "t_attend"] {
            assert!(stmts.iter().any(|s| s.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table))));
        }
    }

    #[actix_rt::test]
    async fn init_schema_is_idempotent() {
        let db = testing::memory_db().await;
        init_schema(&db).await.unwrap();
    }
}
