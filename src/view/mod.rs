//! Display-ordered projections of the timeline model.

pub mod projector;

pub use projector::{filtered_view, sorted_view, ViewRow};
