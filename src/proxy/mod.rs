pub mod handler;
pub mod upstream;
