pub mod capture_provider;
pub mod chunk_observer;
