// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for PostgreSQL (destination) and MySQL (source).

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};
use txn_relay::config::{DestinationConfig, SourceConfig};

const PG_PASSWORD: &str = "postgres";
const MYSQL_PASSWORD: &str = "root";
const MYSQL_DATABASE: &str = "stevedb";

/// Destination table, matching the production layout.
pub const TRANSACTION_DDL: &str = "CREATE TABLE transaction (
    transaction_pk   BIGINT PRIMARY KEY,
    event_timestamp  TIMESTAMP NOT NULL,
    connector_pk     BIGINT NOT NULL,
    id_tag           TEXT NOT NULL,
    start_timestamp  TIMESTAMP,
    start_value      TEXT,
    stop_timestamp   TIMESTAMP,
    stop_value       TEXT,
    stop_reason      TEXT,
    fail_reason      TEXT
)";

/// Create a PostgreSQL container.
///
/// The ready message is printed once by the init server too, so callers
/// should connect through [`connect_pg`], which retries.
pub fn postgres_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("postgres", "16-alpine")
        .with_env_var("POSTGRES_PASSWORD", PG_PASSWORD)
        .with_exposed_port(5432)
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ));
    docker.run(image)
}

/// Create a MySQL 8.0 container. Binary logging is on by default.
pub fn mysql_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("mysql", "8.0")
        .with_env_var("MYSQL_ROOT_PASSWORD", MYSQL_PASSWORD)
        .with_env_var("MYSQL_DATABASE", MYSQL_DATABASE)
        .with_exposed_port(3306)
        .with_wait_for(WaitFor::message_on_stderr("port: 3306"));
    docker.run(image)
}

pub fn destination_config(container: &Container<'_, GenericImage>) -> DestinationConfig {
    DestinationConfig {
        host: "127.0.0.1".to_string(),
        port: container.get_host_port_ipv4(5432),
        user: "postgres".to_string(),
        password: PG_PASSWORD.to_string(),
        database: "postgres".to_string(),
        ssl_mode: "disable".to_string(),
        table: "transaction".to_string(),
        max_connections: 2,
        acquire_timeout: "5s".to_string(),
    }
}

pub fn source_config(container: &Container<'_, GenericImage>) -> SourceConfig {
    SourceConfig {
        host: "127.0.0.1".to_string(),
        port: container.get_host_port_ipv4(3306),
        user: "root".to_string(),
        password: MYSQL_PASSWORD.to_string(),
        database: MYSQL_DATABASE.to_string(),
    }
}

/// Connect to the destination, retrying while the server finishes booting.
pub async fn connect_pg(config: &DestinationConfig) -> PgPool {
    let url = format!(
        "postgres://{}:{}@{}:{}/{}",
        config.user, config.password, config.host, config.port, config.database
    );
    let mut last_err = None;
    for _ in 0..30 {
        match PgPoolOptions::new().max_connections(2).connect(&url).await {
            Ok(pool) => return pool,
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("PostgreSQL never became ready: {:?}", last_err);
}

/// Connect to the source, retrying while the server finishes booting.
pub async fn connect_mysql(config: &SourceConfig) -> MySqlPool {
    let mut last_err = None;
    for _ in 0..60 {
        match MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(config.connect_options())
            .await
        {
            Ok(pool) => return pool,
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("MySQL never became ready: {:?}", last_err);
}

/// Create the destination table.
pub async fn create_transaction_table(pool: &PgPool) {
    sqlx::query(TRANSACTION_DDL)
        .execute(pool)
        .await
        .expect("Failed to create transaction table");
}
