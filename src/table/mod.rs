pub mod console;
pub mod filter;
pub mod html;
pub mod renderer;
pub mod span;
pub mod table_model;
