pub mod document_store;
pub mod file_storage;
