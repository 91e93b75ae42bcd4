//! Status surface for brief generation.
//!
//! Section tasks, the question queue and the persistence writer report
//! progress as [`BriefEvent`]s on a broadcast [`EventBus`]. Presentation
//! layers subscribe (optionally through an [`EventFilter`]) and render
//! however they like; the core makes no assumption about the consumer.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Orchestrator │────▶│  Event Bus   │────▶│  Subscribers │
//! │   / writer   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventFilter, FilteredReceiver, SharedEventBus, DEFAULT_CAPACITY};
pub use types::BriefEvent;
