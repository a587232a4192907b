pub mod identity;
pub mod page_model;
