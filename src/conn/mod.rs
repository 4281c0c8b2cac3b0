//! Connection and session layer: the process-wide open-database handle
//! and the thread-bounded transaction/cursor handle opened against it.
//!
//! Grounded on `examples/original_source/src/conn/conn_api.c` (the
//! connection-open/config/close lifecycle) and `conn_dhandle.c` (per-handle
//! reference counting, echoed here in `Chunk`'s own refcount rather than
//! duplicated at the connection level).

mod connection;
mod session;

pub use connection::{Connection, ConnectionOptions};
pub use session::Session;
