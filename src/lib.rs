//! pollcms: composite aggregate forms for a polling CMS
//!
//! A question (or user) is edited together with its sub-entities and child
//! collections. One submission is bound and validated as a unit, then
//! persisted root first so children can point back at it.

pub mod application;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
