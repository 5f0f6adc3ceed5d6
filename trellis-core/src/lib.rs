//! Trellis Core
//!
//! This crate provides a virtual-tree reconciliation engine. Components
//! describe the output they want as trees of target defs; the engine pairs
//! each new description with what it rendered before and turns the
//! difference into a minimal list of mutations for a real output tree.
//!
//! It implements:
//!
//! - Pairing of old and new children by key and kind, with move detection
//! - Component boundaries with update decisions and lifecycle hooks
//! - A two-phase (update, render) refresh scheduler with deferrals
//! - A render applier over a pluggable output backend
//! - Reassimilation of existing output
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: props and the depth-parameterized comparison
//! - `def`: target defs produced by renders and the applied defs kept between them
//! - `tree`: the persistent node skeleton and its nearest-real-node cache
//! - `boundary`: components, boundaries and updater handles
//! - `cycle`: refresh cycles, timeouts and clocks
//! - `render`: render infos, the applier and output backends
//! - `host`: the public entry point
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{Host, HostSettings, TargetDef};
//! use trellis_core::cycle::ManualClock;
//!
//! let host = Host::with_clock(HostSettings::synchronous(), ManualClock::new()).unwrap();
//! let list = |keys: &[i64]| {
//!     TargetDef::element("ul").children(keys.iter().map(|&k| TargetDef::element("li").key(k).child(k)))
//! };
//!
//! host.update_root(list(&[1, 2, 3])).unwrap();
//! host.update_root(list(&[3, 1, 2])).unwrap();
//!
//! assert_eq!(host.markup().unwrap(), "<ul><li>3</li><li>1</li><li>2</li></ul>");
//! assert_eq!(host.last_report().unwrap().created, 0);
//! ```

pub mod boundary;
pub mod cycle;
pub mod def;
pub mod error;
pub mod render;
pub mod settings;
pub mod tree;
pub mod value;

mod engine;
mod host;

pub use boundary::{BoundaryId, Component, ComponentType, HookCx, RenderCx, UpdateModes, Updater};
pub use cycle::{Clock, ManualClock, RefreshHandle, Timeout, TokioClock};
pub use def::{Key, NodeRef, RemoveHook, RenderOutput, TargetDef};
pub use error::{HostError, SettingsError};
pub use host::Host;
pub use render::{ApplyReport, MemoryDom, OutputBackend, ReassimilateOptions, RealNode, RenderFlags, RenderInfo};
pub use settings::{DuplicatePolicy, HostSettings, LifecycleTiming};
pub use value::{CompareDepth, Props, Value};
