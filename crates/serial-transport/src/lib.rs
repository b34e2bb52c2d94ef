//! serial-transport: blocking serial link abstractions
//!
//! This crate provides traits and types for opening and reading host serial ports
//! with feature-gated backends. The default build enables a `mock` backend so that
//! binaries and tests can run on any host without attached hardware; the `native`
//! feature adds a backend on top of the `serialport` crate.

mod types;
pub use types::{LinkConfig, PortEntry, RawFrame, MAX_LINE_LEN, READ_TIMEOUT};

mod error;
pub use error::{classify_open_failure, Result, TransportError};

mod traits;
pub use traits::{SerialBackend, SerialLink};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBackend, MockOpenFailure, MockPort};

#[cfg(feature = "native")]
mod native;

#[cfg(feature = "native")]
pub use native::{NativeBackend, NativeLink};
