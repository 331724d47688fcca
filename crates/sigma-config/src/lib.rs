#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **sigma-config** – Hierarchical configuration-tree client for the
//! Sigma data gateway (spec §4.6 "Config store as a tree").
//!
//! `spec.md` specifies a ZooKeeper-shaped hierarchical byte-array KV
//! store with recursive watches. No ZooKeeper client crate exists in
//! this ecosystem corpus, so [`FsConfigStore`] honors the same
//! [`ConfigStoreClient`] trait contract over a watched directory tree
//! instead (see `/root/crate/DESIGN.md`, OQ-2).

mod client;
mod error;
mod fs;
mod tree;

pub use client::{ConfigStoreClient, FsConfigStore};
pub use error::ConfigError;
pub use tree::{split_path, ConfigNode, ConfigTree};
