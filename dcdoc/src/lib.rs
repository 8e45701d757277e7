//! Device control policy conversion and documentation.
//!
//! Device control policies come in three shapes: Windows Group Policy XML,
//! Intune custom OMA-URI XML (one group or rule per file) and macOS JSON.
//! This library reads all three into one model, tracks every definition of
//! every group and rule, and renders a selection of rules back into any of
//! the formats alongside human-readable documentation.
//!
//! # Architecture
//!
//! ## Model & Parsing
//!
//! - [`model`] - Groups, rules, entries, parameters and settings
//! - [`parse`] - Windows XML and macOS JSON readers
//! - [`mac_mappings`] - Name and value tables between macOS and Windows
//!
//! ## Conversion
//!
//! - [`mac_convert`] - Windows documents to the macOS policy
//! - [`oma_uri`] - Intune custom setting rows
//! - [`inventory`] - Loading, conflict tracking, queries and OMA-URI synthesis
//! - [`support`] - What a target surface can represent
//!
//! ## Reporting
//!
//! - [`report`] - Markdown reports and README
//! - [`templates`] - Built-in and user Jinja templates
//! - [`clause_table`] - macOS clause trees as table rows
//! - [`csv_export`] - Flat CSV extracts
//! - [`scenarios`] - Report jobs and scenario files
//!
//! ## Utilities
//!
//! - [`config`] - Layered run configuration
//! - [`error`] - Error types per boundary
//! - [`naming`] - File names, anchors and OMA-URI encoding
//!
//! # Examples
//!
//! ```ignore
//! use dcdoc::inventory::{Inventory, InventoryOptions, RuleQuery};
//!
//! let mut inventory = Inventory::new(InventoryOptions::default());
//! inventory.load(&["policies".into()]);
//! let result = inventory.run_query(&RuleQuery::parse("path.str.contains('usb')"));
//! println!("{} rules, entry type {}", result.rules.len(), result.entry_type);
//! ```
//!
//! # Built on policy-xml
//!
//! XML tokenizing and writing live in `policy-xml`; everything device control
//! specific is in this crate.

pub mod clause_table;
pub mod config;
pub mod csv_export;
pub mod error;
pub mod inventory;
pub mod mac_convert;
pub mod mac_mappings;
pub mod model;
pub mod naming;
pub mod oma_uri;
pub mod parse;
pub mod report;
pub mod scenarios;
pub mod support;
pub mod templates;
