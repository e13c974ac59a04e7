//! Robotics news ingestion: RSS feeds in, a bounded archive of translated,
//! classified items out.

pub mod classify;
pub mod config;
pub mod enrich;
pub mod feed;
pub mod filter;
pub mod pipeline;
pub mod registry;
pub mod storage;
pub mod util;
