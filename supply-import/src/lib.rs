//! Bulk importer for school supply lists
//!
//! Reads a spreadsheet of supply lists, groups its rows into
//! school / course / subject / list units, pairs them with PDF documents and
//! writes them to the content store as appended list versions.

pub mod api;
pub mod cli;
pub mod config;
pub mod import;
pub mod services;
