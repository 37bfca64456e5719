//! # arbor-core
//!
//! Core types for the arbor tree explorer.
//!
//! This crate provides the foundations the explorer crates build on:
//! the node arena, the event bus, settings, the tracked-buffer
//! registry, and the text-buffer seam the render engine writes into.
//!
//! ## Core Abstractions
//!
//! - [`NodeArena`] - Generational arena owning the explorer tree
//! - [`Node`] / [`NodeId`] / [`NodeUid`] - Tree entries and their identities
//! - [`EventBus`] - Fire-and-forget change notification
//! - [`Settings`] - Dotted-key configuration store
//! - [`BufferRegistry`] - Tracked editor buffers and modified flags
//! - [`TextBuffer`] - Line buffer the engine renders into
//! - [`HighlightRegistry`] - Named highlight groups with linking
//! - [`CoreError`] - Error types for core operations
//!
//! ## Example
//!
//! ```
//! use arbor_core::{EventBus, Node, NodeArena};
//! use std::path::PathBuf;
//!
//! let mut arena = NodeArena::new();
//! let root = arena.insert(Node::root(PathBuf::from("/tmp")));
//! assert!(arena.contains(root));
//!
//! let bus = EventBus::new(64);
//! let _rx = bus.subscribe();
//! ```

pub mod buffer;
pub mod bufreg;
pub mod debounce;
pub mod error;
pub mod event;
pub mod highlight;
pub mod node;
pub mod settings;

pub use buffer::{MemoryBuffer, TextBuffer};
pub use bufreg::{BufferEntry, BufferRegistry};
pub use debounce::{debounce, throttle, Debounced, Throttled, ThrottleOptions};
pub use error::{CoreError, CoreResult};
pub use event::{Event, EventBus};
pub use highlight::{HighlightRegistry, HighlightTarget};
pub use node::{normalize_path, FileStat, Node, NodeArena, NodeId, NodeKind, NodeUid};
pub use settings::Settings;
