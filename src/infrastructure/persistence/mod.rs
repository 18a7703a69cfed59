pub mod in_memory_store;
pub mod migrations;
pub mod sqlite_store;
