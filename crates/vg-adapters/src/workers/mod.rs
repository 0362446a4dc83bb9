//! Concrete worker implementations for the six `WorkerId`s (§4.4).

pub mod analyst;
pub mod code;
pub mod geo;
pub mod redactor;
pub mod reflection_worker;
pub mod search;

pub use analyst::AnalystWorker;
pub use code::CodeWorker;
pub use geo::GeoWorker;
pub use redactor::RedactorWorker;
pub use reflection_worker::ReflectionWorker;
pub use search::SearchWorker;
