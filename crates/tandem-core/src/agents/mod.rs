//! Agent catalog, registry, and routing
//!
//! Agent definitions are immutable and code-defined. They are loaded once
//! into an in-memory registry at process start and never mutated at runtime.

mod definitions;
mod registry;
mod routing;

pub use definitions::{builtin_agents, AgentDefinition, BASELINE_AGENT};
pub use registry::AgentRegistry;
pub use routing::{AgentRoute, AgentRoutingTable};
