//! Nested buckets addressed by key paths.
//!
//! A key path is a list of name segments such as `["users", "alice"]`. All
//! segments but the last name buckets, resolved from the root on every call;
//! the last names a leaf or a child bucket. Data lives in a redb database.
//!
//! # Example
//!
//! ```rust
//! use std::ops::ControlFlow;
//! use giztoy_bolt::Db;
//!
//! let db = Db::memory().unwrap();
//! db.update(|tx| {
//!     tx.set(&["users", "alice"], b"A1")?;
//!     tx.create_bucket(&["users", "admins"])
//! })
//! .unwrap();
//!
//! let mut names = Vec::new();
//! db.view(|tx| {
//!     tx.scan(&["users"], b"", |name, _value, _is_bucket| {
//!         names.push(String::from_utf8_lossy(name).to_string());
//!         Ok(ControlFlow::Continue(()))
//!     })
//! })
//! .unwrap();
//! assert_eq!(names, ["admins", "alice"]);
//! ```

pub mod db;
pub mod engine;
pub mod error;
mod redb;
mod scan;
pub mod tx;

pub use db::{Db, Options};
pub use engine::{BucketRef, Engine, Entry, Visit};
pub use error::{BoltError, BoltResult};
pub use tx::{Target, Tx};
