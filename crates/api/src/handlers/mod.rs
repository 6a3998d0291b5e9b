pub mod events;
pub mod runs;
pub mod templates;
pub mod workflows;
