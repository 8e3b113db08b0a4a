pub mod schemas;
pub mod transcript;
