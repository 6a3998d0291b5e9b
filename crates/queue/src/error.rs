use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("event queue is full")]
    Full,

    #[error("event queue is closed")]
    Closed,
}
