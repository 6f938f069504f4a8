// Content context: what kind of activity is going on and how much coordination it is worth

// Public API - what other modules can use
pub use models::{
    ContentContext, ContentKind, CoordinationFeature, Difficulty, WorldMetadata, ZoneKind,
};
pub use resolver::{classify, intensity_for, ContentContextResolver};

// Internal modules
mod models;
mod resolver;
