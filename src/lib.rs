#![deny(missing_docs)]
//! A lightweight FTP(S) server core for Rust.
//!
//! featherftp implements RFC 959 plus the commonly deployed extensions
//! (EPSV/EPRT, MLSD, REST, SIZE, MDTM) and explicit TLS per RFC 4217, aimed
//! at long-running deployment on commodity servers and resource-constrained
//! devices. It exposes the native filesystem, chrooted logically to each
//! user's home directory.
//!
//! # Quick start
//!
//! ```no_run
//! use featherftp::{options::{Config, UserAccount}, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = Config::default();
//!     config.bind_addr = "127.0.0.1:2121".parse().unwrap();
//!     config.users.push(UserAccount {
//!         name: "demo".to_string(),
//!         password: Some("demo".to_string()),
//!         home: "/srv/ftp/demo".into(),
//!         ownership_override: None,
//!         read_only: false,
//!     });
//!     Server::new(config).listen().await.unwrap();
//! }
//! ```

pub mod auth;
pub mod fs;
pub mod options;

pub(crate) mod metrics;
pub(crate) mod server;

pub use crate::server::{Server, ServerError};
