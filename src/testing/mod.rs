//! Headless testing helpers: Pilot, snapshot helpers.
//!
//! Use the [`Pilot`] to drive a mounted view without a host: click elements,
//! send messages, settle the hub, and inspect the tree. Use
//! [`render_to_string`] and related helpers to capture output as plain text
//! for snapshot-style assertions.

pub mod pilot;
pub mod snapshot;

pub use pilot::Pilot;
pub use snapshot::{display_list_to_string, engine_html, outline, render_to_string};
