mod backoff;
mod client;
mod frame;

pub use backoff::{Backoff, ReconnectPolicy};
pub use client::StreamClient;
pub use frame::{
    AgentError, CodePayload, Diff, Goal, Milestone, StreamFrame, ThoughtPayload,
};

pub(crate) use frame::lenient_id;
