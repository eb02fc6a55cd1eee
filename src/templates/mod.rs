//! HTML templates and styling for the notebook page.
//!
//! ## Module Structure
//!
//! - `styles` - CSS constants and theme
//! - `notebook` - the notebook page and its client script

mod notebook;
mod styles;

pub use notebook::{html_escape, render_notebook_page};
pub use styles::STYLE;
