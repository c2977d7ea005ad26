pub mod clock;
pub mod collections;
pub mod delete_outcomes;
pub mod pages;
pub mod purge_results;
pub mod retention;
