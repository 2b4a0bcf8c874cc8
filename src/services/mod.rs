//! Collaborator services the engine consumes.
//!
//! - Media retrieval (`MediaSource`, `MediaSources`)

mod media;

pub use media::{HttpMediaSource, LocalMediaSource, MediaSource, MediaSources};
