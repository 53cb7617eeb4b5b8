//! Managed evaluation clients.

mod evaluation;
mod managed;

pub use evaluation::{ClientConfig, EvaluationClient, EventTags, UserAttributes};
pub use managed::{ClientFactory, ManagedClient, ManagedClientBuilder, ManagerFactory};
