//! Scraper for the Western States Endurance Run historical archive.
//!
//! Pulls result, entrant, lottery, waitlist and split data off the
//! race-organization website, normalizes decades of inconsistent table
//! layouts into a uniform resource representation, and caches one JSON
//! document per (year, source type) on disk.

pub mod common;
pub mod config;
pub mod infra;
pub mod observability;
pub mod pipeline;
pub mod sources;
