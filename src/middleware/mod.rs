pub mod headers;
pub mod language;
pub mod metrics;
pub mod rewrite;
