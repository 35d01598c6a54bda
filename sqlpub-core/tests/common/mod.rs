//! Shared fixtures for SQLite-backed integration tests.
//!
//! Each fixture is a file-backed database in its own temporary directory so
//! tests can run in parallel and the publisher can open its own pool on it.

#![allow(dead_code)]

use sqlpub_core::models::Shape;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tempfile::TempDir;

const SEED: &str = "
    CREATE TABLE Agents (
        AGENT_CODE TEXT NOT NULL,
        AGENT_NAME TEXT,
        WORKING_AREA TEXT,
        COMMISSION REAL,
        PHONE_NO TEXT,
        BADGE BLOB
    );
    INSERT INTO Agents VALUES ('A007', 'Ramasundar', 'Bangalore', 0.15, '077-25814763', X'616263');
    INSERT INTO Agents VALUES ('A003', 'Alex', 'London', 0.13, '075-12458969', X'646566');
    INSERT INTO Agents VALUES ('A008', 'Alford', 'New York', 0.12, NULL, NULL);

    CREATE TABLE Customers (
        CUST_CODE TEXT NOT NULL,
        CUST_NAME TEXT,
        GRADE INTEGER,
        OUTSTANDING_AMT REAL,
        AGENT_CODE TEXT
    );
    INSERT INTO Customers VALUES ('C00013', 'Holmes', 2, 6000.0, 'A003');
    INSERT INTO Customers VALUES ('C00001', 'Micheal', 2, 5000.0, 'A008');

    CREATE TABLE Documents (
        ID INTEGER,
        SHORT_BODY BLOB,
        LONG_BODY BLOB
    );
    INSERT INTO Documents VALUES (1, X'616263', zeroblob(2000));

    CREATE TABLE Empty (
        ID INTEGER,
        NAME TEXT
    );

    CREATE TABLE Audit (
        EVENT TEXT
    );

    CREATE TABLE Orders (
        ID INTEGER,
        AMOUNT DECIMAL(10,2),
        CREATED DATETIME,
        SHIPPED DATE,
        N NUMERIC,
        PAID BOOLEAN
    );
    INSERT INTO Orders VALUES (1, 19.99, '2024-01-31 10:15:00', '2024-02-02', 42, 1);
    INSERT INTO Orders VALUES (2, 5.5, '2024-02-01 08:00:00', NULL, 7, 0);
";

/// Query producing `rows` sequential integers in a column named `x`.
pub fn sequence_query(rows: u64) -> String {
    format!(
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < {}) \
         SELECT x FROM c",
        rows
    )
}

/// A seeded database living in a temporary directory.
pub struct Fixture {
    /// Kept alive for the duration of the test
    pub dir: TempDir,
    /// `sqlite://` URL of the database file
    pub url: String,
    /// Direct pool for seeding and verification
    pub pool: SqlitePool,
}

impl Fixture {
    /// Settings blob pointing at this database.
    pub fn settings_json(&self) -> String {
        settings_json(&self.url, None, None)
    }

    /// Events written to the `Audit` table by pre/post publish queries.
    pub async fn audit_events(&self) -> Vec<String> {
        sqlx::query_scalar::<_, String>("SELECT EVENT FROM Audit ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .unwrap()
    }
}

/// Creates a fresh seeded database.
pub async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w3.db");

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();
    sqlx::raw_sql(SEED).execute(&pool).await.unwrap();

    Fixture {
        url: format!("sqlite://{}", path.display()),
        dir,
        pool,
    }
}

/// Builds a settings blob. SQLite URLs do not carry a password, so the
/// placeholder is left out and any non-empty password satisfies validation.
pub fn settings_json(url: &str, pre: Option<&str>, post: Option<&str>) -> String {
    let mut settings = serde_json::json!({
        "connectionString": url,
        "password": "unused",
    });
    if let Some(pre) = pre {
        settings["prePublishQuery"] = serde_json::json!(pre);
    }
    if let Some(post) = post {
        settings["postPublishQuery"] = serde_json::json!(post);
    }
    settings.to_string()
}

pub fn agents_shape() -> Shape {
    Shape::new("[Agents]", "Agents", "SELECT * FROM Agents")
}

pub fn customers_shape() -> Shape {
    Shape::new("[Customers]", "Customers", "SELECT * FROM Customers")
}

pub fn orders_shape() -> Shape {
    Shape::new("[Orders]", "Orders", "SELECT * FROM Orders")
}
