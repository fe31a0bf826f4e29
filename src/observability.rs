pub(crate) mod tracing;

pub use self::tracing::{init, shutdown};
