//! Context Packer: builds character-budgeted context per brief section.
//!
//! Raw document text is split into paragraphs, stripped of boilerplate and
//! exact duplicates, and clipped per section kind. The technical section
//! reorders chunks by keyword relevance before clipping.

pub mod boilerplate;
pub mod packer;

pub use boilerplate::is_boilerplate;
pub use packer::{chunk_document, clip_chunks, technical_score, Chunk, ContextPackage, ContextPacker};
