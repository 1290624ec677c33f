//! A small server-rendered task tracker backed by a single JSON file.

pub mod cli;
pub mod commands;
pub mod config;
pub mod csrf;
pub mod flash;
pub mod model;
pub mod pages;
pub mod server;
pub mod session;
pub mod storage;
pub mod validation;
