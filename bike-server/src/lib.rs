//! Bike-share station server.
//!
//! Serves filtered, sorted, paged views of a fleet of bike stations held
//! in one of two stores, with a result cache that is invalidated on every
//! mutation and a background task simulating a live availability feed.

pub mod cache;
pub mod config;
pub mod domain;
pub mod feed;
pub mod query;
pub mod service;
pub mod store;
