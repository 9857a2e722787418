// Template placeholder binding engine
// Implements: placeholder extraction, field catalog flattening, fuzzy field matching,
// and the suggestion review workflow. Extraction and matching are pure and synchronous;
// only the store and review steps touch persistence.

pub mod discovery;
pub mod extractor;
pub mod fields;
pub mod handlers;
pub mod matcher;
pub mod review;
pub mod similarity;
pub mod store;
