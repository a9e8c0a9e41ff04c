//! Strategy selection and request orchestration

mod coordinator;
mod handle;
mod memory;
mod selector;

pub use coordinator::{
    CoordinatorState, SearchCoordinator, SearchCoordinatorBuilder, adaptive_depth,
};
pub use handle::SearchHandle;
pub use memory::{FixedMemoryProbe, MemoryProbe};
pub use selector::{EngineKind, EngineSelector, PositionProfile, SelectionInput, SelectorConfig};
