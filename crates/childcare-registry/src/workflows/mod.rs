pub mod import;
pub mod merge;
pub mod migration;
