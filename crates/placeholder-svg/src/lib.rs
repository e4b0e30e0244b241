//! Storefront image placeholders
//!
//! Generates inline SVG placeholder images and swaps them into image
//! elements whose product photo failed to load.

mod error;
mod fallback;
mod placeholder;

pub use error::{ElementError, Result};
pub use fallback::{install, FallbackInstaller, ImageElement, ImageTarget};
pub use placeholder::{generate, Placeholder, BACKGROUND_COLOR, DEFAULT_LABEL, DEFAULT_SIZE};
