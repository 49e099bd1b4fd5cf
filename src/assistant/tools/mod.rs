//! Built-in assistant tools: progress update, progress summary, service listing.

pub mod list_services;
pub mod progress_summary;
pub mod update_progress;

pub use list_services::ListServicesTool;
pub use progress_summary::ProgressSummaryTool;
pub use update_progress::UpdateProgressTool;
