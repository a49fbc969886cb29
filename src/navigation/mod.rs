//! Navigation guidance
//!
//! This module turns an accepted plan into an annotated [`ExtendedPath`] and
//! runs the [`GuidanceManager`] state machine that emits [`Guidance`] for each
//! incoming pose.

pub mod extended_path;
/// Instruction text rendering
pub mod formatter;
/// Guidance output types and motion selection
pub mod guidance;
pub mod manager;

pub use extended_path::{ExtendedPath, ExtendedPathElement};
pub use guidance::{Action, GuideStatus, Guidance, Mode, Motion, MoveStatus, TurnDirection};
pub use manager::GuidanceManager;
