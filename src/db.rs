//! Global database connection pool.
//!
//! The pool is initialized once at startup and shared through a static so that
//! handlers and domain modules can reach it without threading it through every
//! call. Integration tests point it at TEST_DATABASE_URL instead.

use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Connect to the database and store the pool.
/// Panics if called twice or if the connection fails; there is nothing useful
/// the application can do without a database.
pub async fn init_db(database_url: String) {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(16)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600));

    let pool = Database::connect(opt)
        .await
        .expect("Failed to connect to database");

    DB_POOL
        .set(pool)
        .expect("init_db() called more than once");
}

/// Borrow the global connection pool.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("Database pool is not initialized")
}
