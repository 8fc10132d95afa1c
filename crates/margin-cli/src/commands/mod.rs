//! Command implementations.

pub mod ingest;
pub mod split;
pub mod status;
pub mod worker;

pub use self::ingest::execute_ingest;
pub use self::split::execute_split;
pub use self::status::execute_status;
pub use self::worker::execute_worker;
