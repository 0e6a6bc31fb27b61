//! Built-in providers for common resource types

pub mod text;
pub mod threaded;

pub use text::{JsonDataProvider, TextDataProvider, JSON_DATA_PROVIDER_ID, TEXT_DATA_PROVIDER_ID};
pub use threaded::{ThreadedTextProvider, THREADED_TEXT_PROVIDER_ID};
