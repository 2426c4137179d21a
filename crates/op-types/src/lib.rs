//! Shared type definitions for onionpass
//!
//! Lightweight, protocol-free types shared by the server library and the CLI.

pub mod auth;
pub mod config;
pub mod ssh;
