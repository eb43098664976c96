pub mod indices;
pub mod metadata;
pub mod names;
pub mod vernaculars;
