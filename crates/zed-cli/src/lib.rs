//! Library surface of the `zed` binary: the driver is exposed so
//! integration tests can run programs over in-memory readers.

pub mod driver;

pub use driver::{load_program, Driver, LoadError, LoadedProgram, DEFAULT_MAX_RECORD_LEN};
