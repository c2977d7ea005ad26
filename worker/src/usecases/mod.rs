pub mod database_cleanup;
pub mod purge_collection;
pub mod purge_orchestrator;
