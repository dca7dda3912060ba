//! Game core
//!
//! Single-threaded and cooperative: a virtual-clock scheduler drives motion
//! controllers over the scene registry, while the state machine reacts to
//! external events between ticks.
//! - Seeded RNG only
//! - Stable iteration order (by entity and controller id)
//! - No rendering or platform dependencies; output goes through `Surface`

pub mod motion;
pub mod scene;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod tick;

pub use motion::{ControllerId, MotionKind, Motions};
pub use scene::{Entity, EntityId, Role, Scene};
pub use scheduler::{CallbackFault, Scheduler, TaskHandle, TickReport};
pub use session::{AnswerOutcome, PlayerSession, PlayerSlot};
pub use state::{Game, GamePhase};
pub use tick::Job;
