#![allow(dead_code)]

use gradebook::{
    domain::{ActorRef, CreateUserRequest, Role, User},
    repository::{SqliteUserRepository, UserRepository},
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Fresh in-memory database with migrations applied. A single connection
/// keeps every query on the same in-memory database.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// File-backed database with several connections, for tests where writes
/// really run in parallel. The file is removed when the guard drops.
pub async fn file_pool(connections: u32) -> anyhow::Result<(SqlitePool, TempDb)> {
    let path = std::env::temp_dir().join(format!("gradebook-test-{}.db", uuid::Uuid::new_v4()));
    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok((pool, TempDb(path)))
}

pub struct TempDb(std::path::PathBuf);

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.0.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

pub async fn create_user(pool: &SqlitePool, username: &str, role: Role) -> anyhow::Result<User> {
    let repo = SqliteUserRepository::new(pool.clone());
    let user = repo
        .create(CreateUserRequest {
            username: username.to_string(),
            full_name: format!("{} user", username),
            email: format!("{}@example.com", username),
            password: "correct horse".to_string(),
            role,
        })
        .await?;
    Ok(user)
}

pub fn actor(user: &User) -> ActorRef {
    ActorRef::from(user)
}
