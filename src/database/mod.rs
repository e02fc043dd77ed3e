// Database module
// Vector storage and similarity search via LanceDB

pub mod lancedb;

pub use self::lancedb::*;
