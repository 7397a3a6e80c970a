pub mod discover;
pub mod hash;
pub mod merge;
