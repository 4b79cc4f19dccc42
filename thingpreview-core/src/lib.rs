// thingpreview core library
//
// Debounced, batched and cached lookups of work, edition and author previews

pub mod cache;
pub mod coalescer;
pub mod entity;
pub mod error;
pub mod key;
pub mod lookup;
pub mod markup;
pub mod render;

pub use coalescer::{CoalescerConfig, CoalescerState, RequestCoalescer, RetryPolicy};
pub use entity::Entity;
pub use error::{ConfigError, LookupError};
pub use key::{Domain, ThingKey};
pub use lookup::ThingLookup;
pub use markup::{scan_placeholders, Placeholder};
pub use render::{RenderFn, RenderRegistry, RenderedPreview};
