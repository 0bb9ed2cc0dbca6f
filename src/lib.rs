// src/lib.rs — Library root for pairup

pub mod api;
pub mod cli;
pub mod infra;
pub mod realtime;
pub mod session;
pub mod storage;
