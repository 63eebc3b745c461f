pub mod pid;
pub mod schema;
pub mod search;
pub mod server;
pub mod store;
pub mod traversal;

pub use pid::{PidFile, ServerPid};
pub use server::{ensure_server, shutdown_server};
pub use store::SurrealGraphStore;
