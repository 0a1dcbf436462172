pub mod backend;
pub mod text;
