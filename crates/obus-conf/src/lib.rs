//! Typed configuration store for the OBus message bus.
//!
//! Configuration lives in a small line-oriented text format (see
//! [`parser`]) with three value types: integers, multi-line strings, and
//! arrays of either. A [`ConfigStore`] loads one file at a time and hands out
//! counted [`EntryRef`] handles to the values it holds.
//!
//! # Loading
//!
//! [`ConfigStore::load`] reports one of three [`LoadStatus`] values:
//!
//! - `Ok` -- the file was parsed and installed.
//! - `Warning` -- the file could not be read; nothing is loaded and the host
//!   should carry on with built-in defaults.
//! - `Fatal` -- the file is malformed; nothing is loaded and the host must not
//!   continue with it.
//!
//! # Ownership
//!
//! 1. The store holds one reference to every top-level entry.
//! 2. Each [`ConfigStore::get`] adds a reference until the handle is released.
//! 3. Array elements belong to their array and are never counted on their own.
//! 4. A load replaces the whole table; handles to old entries stay readable
//!    until released.
//!
//! ```
//! use obus_conf::{ConfigStore, Entry, LoadStatus};
//!
//! let store = ConfigStore::new();
//! assert_eq!(store.load_reader(&b"i:port\n14452\n\n"[..]), LoadStatus::Ok);
//!
//! let port = store.get("port").unwrap();
//! assert_eq!(*port, Entry::Integer(14452));
//! store.release(port);
//! ```

pub mod entry;
pub mod error;
pub mod parser;
pub mod settings;
pub mod store;
pub mod traits;

pub use entry::{Entry, EntryKind};
pub use error::{ConfError, ConfResult, LoadStatus};
pub use parser::{parse_reader, parse_str, ParseState, Parser, Table};
pub use settings::{BusSettings, Role, DEFAULT_PORT};
pub use store::{ConfigStore, EntryRef, KeyPresence};
pub use traits::ConfigSource;
