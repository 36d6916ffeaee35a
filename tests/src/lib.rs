//! # Transport Core Test Suite
//!
//! Cross-subsystem scenarios run against complete transport cores.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── network.rs     # In-memory fabric, plugins and route selection
//!     ├── handshake.rs   # SYN / SYN_ACK / ACK between two cores
//!     ├── validation.rs  # PING / PONG and signature reuse
//!     ├── blacklist.rs   # Static denylist and policy clients
//!     ├── switching.rs   # Address switching and link loss
//!     └── driver.rs      # Cores behind the tokio driver
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tc-tests
//! cargo test -p tc-tests integration::handshake::
//! ```

#![allow(dead_code)]

pub mod integration;
