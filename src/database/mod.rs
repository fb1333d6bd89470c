// Database module
// SQLite storage for persisted namespaces and the usage ledger

pub mod sqlite;

pub use sqlite::*;
