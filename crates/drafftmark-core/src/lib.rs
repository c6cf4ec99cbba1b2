//! drafftmark core library
//!
//! Platform-agnostic data structures and logic for a collaborative vector
//! annotation layer drawn over a shared, grid-based scene.

pub mod camera;
pub mod clock;
pub mod config;
pub mod entity;
pub mod geometry;
pub mod grid;
pub mod identity;
pub mod inspector;
pub mod layer;
pub mod lifecycle;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod sync;
pub mod tools;

pub use camera::Camera;
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use config::SessionConfig;
pub use entity::{Draft, EntityId, EntityKind, Geometry, Owner, StrokeSpec, VectorEntity};
pub use geometry::{DisplayList, LineStyle, Primitive, Rgba, Symbol, SymbolSize};
pub use grid::{GridDescriptor, HexOrientation};
pub use identity::{Role, User, UserId};
pub use inspector::{Inspector, InspectorEntry};
pub use layer::MarkLayer;
pub use lifecycle::{ClearScope, DrawError, EntityManager};
pub use protocol::{Deletion, DrawMessage, Replicator};
pub use session::{DrawingSession, Notice, SessionHost};
pub use sync::{BroadcastChannel, ConnectionState, LocalHub, NativeWebSocket, SyncError, SyncEvent};
pub use tools::{GestureState, ToolMode, ToolSession};
