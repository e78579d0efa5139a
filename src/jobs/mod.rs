pub mod handlers;
pub mod queue;
