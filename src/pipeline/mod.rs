pub mod alert;
pub mod pipeline;
pub mod scoring;
pub mod session;
pub mod summary;
