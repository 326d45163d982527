pub mod compaction;
pub mod database;
pub mod repositories;

pub use database::Database;
pub use repositories::SqliteStore;
