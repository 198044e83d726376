/// Configuration for the SQLite store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the database file. Created when missing.
    pub path: String,

    /// Maximum number of connections in the `sqlx` pool.
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: String::from("cadence.sqlite3"),
            pool_size: 5,
        }
    }
}

impl StoreConfig {
    /// Config pointing at a database file path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}
