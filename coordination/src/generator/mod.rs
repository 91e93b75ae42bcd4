//! Section Generator Adapter and the generation client seam.

pub mod adapter;
pub mod bullets;
pub mod client;
pub mod errors;

pub use adapter::{SectionGenerator, SectionRequest};
pub use bullets::{normalize_bullet, normalize_bullets, parse_bullet_lines};
pub use client::{DeltaCallback, GenerationClient, OneShot, SectionCompletion};
pub use errors::{GenerationError, RetryCategory};
