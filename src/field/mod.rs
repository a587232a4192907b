pub mod field_model;
pub mod store;
pub mod vocabulary;
