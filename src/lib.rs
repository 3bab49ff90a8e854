#![doc = "The `tasktrack` library crate."]
#![doc = ""]
#![doc = "Shared logic for the two TaskTrack services: the user service (identity,"]
#![doc = "bearer tokens) and the task service (per-user task CRUD trusting a"]
#![doc = "server-side session). The binaries under `src/bin/` wire these modules"]
#![doc = "into two independent actix-web servers."]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod routes;
pub mod session;
