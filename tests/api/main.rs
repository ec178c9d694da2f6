//! tests/api/main.rs
mod helpers;
mod job;
