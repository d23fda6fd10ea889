pub mod document;
pub mod token;
