//! Agent runtime for Fleet Assist: the step-guard loop, tool backends,
//! evidence normalization, and the session registry.

pub mod agent_loop;
pub mod connectors;
pub mod credentials;
pub mod diagnosis;
pub mod env;
pub mod evidence;
pub mod fixture;
pub mod gateway;
pub mod guard;
pub mod model;
pub mod reference;
pub mod sessions;
pub mod signals;
pub mod tools;
pub mod transport;
