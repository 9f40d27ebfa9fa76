pub mod forget;
pub mod json;
pub mod large;
pub mod stream;
pub mod text;
