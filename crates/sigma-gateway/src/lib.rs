//! **sigma-gateway** – HTTP surface, request/response shaping, and write
//! orchestration for the Sigma data gateway (spec §4.6–§4.10).
//!
//! Split into a library and a thin binary (`src/main.rs`) so integration
//! tests under `tests/` can build a router against an in-memory fixture
//! without going through `main`'s config-store/process-level startup.

#![forbid(unsafe_code)]

pub mod app;
pub mod error;
pub mod query;
pub mod request;
pub mod response;
pub mod state;
pub mod timefmt;
pub mod write;
