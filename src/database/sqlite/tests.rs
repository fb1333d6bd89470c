use super::*;
use std::collections::HashSet;
use tempfile::TempDir;

async fn table_names(database: &Database) -> Result<HashSet<String>> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'",
    )
    .fetch_all(database.pool())
    .await?;
    Ok(tables.into_iter().collect())
}

#[tokio::test]
async fn namespace_schema_migration() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let database = Database::new(temp_dir.path().join("index.db"), &NAMESPACE_MIGRATOR).await?;

    let expected: HashSet<String> = ["manifest", "chunks"].map(String::from).into();
    assert_eq!(table_names(&database).await?, expected);

    Ok(())
}

#[tokio::test]
async fn usage_schema_migration() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let database = Database::new(temp_dir.path().join("usage.db"), &USAGE_MIGRATOR).await?;

    let expected: HashSet<String> = ["usage_records"].map(String::from).into();
    assert_eq!(table_names(&database).await?, expected);

    Ok(())
}

#[tokio::test]
async fn migrations_are_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("usage.db");

    let database = Database::new(&path, &USAGE_MIGRATOR).await?;
    database.close().await;

    let reopened = Database::new(&path, &USAGE_MIGRATOR).await?;
    reopened.run_migrations(&USAGE_MIGRATOR).await?;
    assert!(table_names(&reopened).await?.contains("usage_records"));

    Ok(())
}

#[tokio::test]
async fn read_only_open_requires_existing_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("missing.db");

    assert!(Database::open_read_only(&path).await.is_err());
    assert!(!path.exists());

    let database = Database::new(&path, &NAMESPACE_MIGRATOR).await?;
    database.close().await;

    let read_only = Database::open_read_only(&path).await?;
    let write = sqlx::query("DELETE FROM chunks")
        .execute(read_only.pool())
        .await;
    assert!(write.is_err());

    Ok(())
}
