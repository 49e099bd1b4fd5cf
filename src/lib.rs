// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # obra
//!
//! Construction progress tracking for housing projects. A project's cost is
//! split by a budget template into weighted line items; field staff record a
//! completion percentage per item and housing unit, and every project-level
//! figure (category progress, overall progress, money released, balance to
//! measure) is derived from that matrix.
//!
//! ## Architecture
//!
//! - **Domain core** (`budget`, `unit`, `matrix`, `project`): template, units,
//!   progress matrix and the aggregate that keeps them consistent
//! - **Aggregation** (`aggregate`): the single weighted roll-up formula
//! - **Reconciliation** (`reconcile`): matrix reshaping when units change
//! - **Assistant** (`assistant`): name-resolved batch updates and AI tools
//! - **Persistence** (`store`): in-memory (DashMap) or durable (redb)
//! - **Boundaries** (`extract`, `backup`, `export`): validated documents in,
//!   backups and reports out
//!
//! ## Library usage
//!
//! ```no_run
//! use obra::project::ProjectData;
//! use obra::tracker::Tracker;
//!
//! let tracker = Tracker::in_memory("alice");
//! let project = tracker
//!     .create_project(ProjectData::new("Residencial Aurora", 150_000.0, 4))
//!     .unwrap();
//! tracker
//!     .with_project(&project.id, |p| p.set_progress("4.1", "u1", 80.0))
//!     .unwrap();
//! let report = tracker.report(&project.id).unwrap();
//! println!("{:.2}% complete", report.snapshot.total_progress);
//! ```

pub mod aggregate;
pub mod assistant;
pub mod backup;
pub mod budget;
pub mod changelog;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod matrix;
pub mod paths;
pub mod project;
pub mod reconcile;
pub mod schedule;
pub mod store;
pub mod tracker;
pub mod unit;
