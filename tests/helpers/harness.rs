use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Connects to an external PostgreSQL server given by DATABASE_URL
pub struct PgTestInstance {
    pub base_url: String,
}

/// Isolated database created for one test and dropped afterwards
pub struct TestDatabase {
    pool: PgPool,
    url: String,
    db_name: String,
    base_url: String,
}

impl TestDatabase {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn execute(&self, sql: &str) {
        use sqlx::Executor;
        self.pool
            .execute(sql)
            .await
            .unwrap_or_else(|e| panic!("Failed to execute SQL: {}\nError: {}", sql, e));
    }

    /// Best effort; never hangs a test run
    pub async fn cleanup(self) {
        self.pool.close().await;

        let db_name = self.db_name.clone();
        let base_url = self.base_url.clone();

        let cleanup_future = async move {
            if let Ok(pool) = PgPool::connect(&base_url).await {
                let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", db_name);
                let _ = sqlx::query(&drop_sql).execute(&pool).await;
                pool.close().await;
            }
        };

        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), cleanup_future).await;
    }
}

impl PgTestInstance {
    /// `None` when DATABASE_URL is not set
    pub fn from_env() -> Option<Self> {
        dotenv::dotenv().ok();
        std::env::var("DATABASE_URL")
            .ok()
            .map(|base_url| Self { base_url })
    }

    pub async fn create_test_database(&self) -> TestDatabase {
        let db_name = format!("tenantry_test_{}", Uuid::new_v4().simple());

        let base_pool = PgPool::connect(&self.base_url)
            .await
            .expect("Failed to connect to PostgreSQL for database creation");

        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name))
            .execute(&base_pool)
            .await
            .expect("Failed to create test database");

        base_pool.close().await;

        let url = match self.base_url.rfind('/') {
            Some(last_slash) => format!("{}/{}", &self.base_url[..last_slash], db_name),
            None => format!("{}/{}", self.base_url, db_name),
        };

        let pool = PgPool::connect(&url)
            .await
            .expect("Failed to connect to newly created test database");

        TestDatabase {
            pool,
            url,
            db_name,
            base_url: self.base_url.clone(),
        }
    }
}

/// Run a test against a fresh database, dropping it afterwards.
///
/// Skips the test body when DATABASE_URL is not set.
///
/// ```ignore
/// #[tokio::test]
/// async fn test_something() -> Result<()> {
///     with_test_db(async |db| {
///         db.execute("CREATE TABLE cards (id INT)").await;
///         Ok(())
///     })
///     .await
/// }
/// ```
pub async fn with_test_db<F>(test_fn: F) -> Result<()>
where
    F: std::ops::AsyncFnOnce(&TestDatabase) -> Result<()>,
{
    let Some(pg) = PgTestInstance::from_env() else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return Ok(());
    };
    let db = pg.create_test_database().await;

    let result = test_fn(&db).await;

    db.cleanup().await;

    result
}
