pub mod drag;
pub mod error;
pub mod expression;
pub mod fortune;
pub mod geometry;
pub mod presentation;

pub use drag::{ClickGuard, DragCoordinator, DragFrame, DragOutcome};
pub use error::{PetError, Result};
pub use expression::{Candidate, Expression, Icon};
pub use fortune::Fortune;
pub use geometry::{AnchorMode, BoundsPolicy, GeometrySolver, Point, Rect, Size, TailPosition, TrayPlacement};
pub use presentation::PresentationState;
