pub mod catalog;
pub mod matching;
pub mod registry;
