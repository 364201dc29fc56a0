//! Core of pgpoll: drives a non-blocking database driver from a single-threaded reactor.
//!
//! Not intended to be used directly; see the `pgpoll` crate.
#![warn(future_incompatible, rust_2018_idioms)]
#![forbid(unsafe_code)]
#![cfg(unix)]

#[macro_use]
pub mod error;

mod completion;

pub mod connection;
pub mod cursor;
pub mod driver;
pub mod options;
pub mod reactor;
pub mod rt;

pub use error::{Error, Result};
