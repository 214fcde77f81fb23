pub mod common;
pub mod completions;
pub mod enqueue;
pub mod maintenance;
pub mod mark;
pub mod pending;
pub mod probe;
pub mod status;
pub mod tenants;
