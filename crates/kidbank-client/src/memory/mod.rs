//! In-process backends: the shell's `memory` storage option and the fakes
//! the tests run against.

mod gateway;
mod identity;

pub use gateway::MemoryGateway;
pub use identity::MemoryIdentity;
