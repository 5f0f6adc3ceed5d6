//! Output
//!
//! Everything on the output side of the engine: the backend abstraction, the
//! render infos pairing emits, and the applier that turns them into backend
//! operations.

mod applier;
mod info;
mod memory;
mod output;
mod reassimilate;

pub use applier::Applier;
pub use info::{ApplyReport, RenderFlags, RenderInfo};
pub use memory::{DomStats, MemoryDom};
pub use output::{OutputBackend, RealNode};
pub use reassimilate::{ReassimilateOptions, Suggester, Validator};
