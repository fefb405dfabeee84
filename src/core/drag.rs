use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::geometry::{AnchorMode, GeometrySolver, Point, Rect, Size};
use crate::core::Result;
use crate::host::WindowHost;

/// About 60 Hz.
pub const DRAG_TICK: Duration = Duration::from_millis(16);
/// Net pointer travel above which a gesture counts as a drag rather than a click.
pub const CLICK_THRESHOLD_PX: i32 = 3;
/// How long a click right after a drag is swallowed.
pub const CLICK_COOLDOWN: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Gesture {
    /// Pointer minus anchor origin at gesture start.
    offset: Point,
    /// Drag never resizes the anchor.
    size: Size,
    start_pointer: Point,
    last_pointer: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    Dragging(Gesture),
}

/// Positions applied during one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragFrame {
    pub anchor: Rect,
    /// `None` when the bubble is hidden or hangs off the tray.
    pub bubble: Option<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragTick {
    Moved(DragFrame),
    /// A read or write failed; try again next tick.
    Skipped,
    /// The anchor is gone. The coordinator is idle again and the timer must stop.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOutcome {
    /// Net pointer travel exceeded `CLICK_THRESHOLD_PX` on some axis.
    pub moved: bool,
    /// Final bubble position solved from the settled anchor bounds.
    pub bubble: Option<Point>,
}

/// Moves the pet with the pointer and keeps the bubble attached without a frame of lag.
///
/// Each tick computes the new anchor rectangle from the pointer and feeds that same
/// rectangle to the solver; the window is never re-queried mid-gesture. `end` does one
/// final solve against the real bounds to absorb any drift.
#[derive(Debug, Clone)]
pub struct DragCoordinator {
    state: DragState,
}

impl DragCoordinator {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn begin<H: WindowHost + ?Sized>(&mut self, host: &H) -> Result<()> {
        let pointer = host.cursor_position()?;
        let anchor = host.anchor_bounds()?;
        self.state = DragState::Dragging(Gesture {
            offset: Point::new(pointer.x - anchor.x, pointer.y - anchor.y),
            size: anchor.size(),
            start_pointer: pointer,
            last_pointer: pointer,
        });
        debug!(?pointer, ?anchor, "drag started");
        Ok(())
    }

    pub fn tick<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        solver: &GeometrySolver,
        mode: AnchorMode,
    ) -> DragTick {
        let DragState::Dragging(gesture) = &mut self.state else {
            return DragTick::Skipped;
        };

        if !host.anchor_alive() {
            debug!("anchor destroyed mid-drag, cancelling");
            self.state = DragState::Idle;
            return DragTick::Cancelled;
        }

        let pointer = match host.cursor_position() {
            Ok(pointer) => pointer,
            Err(err) => {
                debug!(%err, "cursor read failed, skipping tick");
                return DragTick::Skipped;
            }
        };
        gesture.last_pointer = pointer;

        let anchor = Rect::new(
            pointer.x - gesture.offset.x,
            pointer.y - gesture.offset.y,
            gesture.size.width,
            gesture.size.height,
        );
        if let Err(err) = host.set_anchor_bounds(anchor) {
            debug!(%err, "anchor move failed, skipping tick");
            return DragTick::Skipped;
        }

        let bubble = if mode == AnchorMode::Pet && host.bubble_visible() {
            host.bubble_size().ok().and_then(|size| {
                let origin = solver.solve(size, mode, anchor);
                host.move_bubble(origin).ok().map(|_| origin)
            })
        } else {
            None
        };

        DragTick::Moved(DragFrame { anchor, bubble })
    }

    /// Returns `None` when no gesture was in progress.
    pub fn end<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        solver: &GeometrySolver,
        mode: AnchorMode,
    ) -> Option<DragOutcome> {
        let DragState::Dragging(gesture) = std::mem::replace(&mut self.state, DragState::Idle)
        else {
            return None;
        };

        let dx = (gesture.last_pointer.x - gesture.start_pointer.x).abs();
        let dy = (gesture.last_pointer.y - gesture.start_pointer.y).abs();
        let moved = dx > CLICK_THRESHOLD_PX || dy > CLICK_THRESHOLD_PX;

        let bubble = if mode == AnchorMode::Pet && host.bubble_visible() {
            snap_bubble(host, solver, mode)
        } else {
            None
        };

        debug!(moved, ?bubble, "drag ended");
        Some(DragOutcome { moved, bubble })
    }
}

impl Default for DragCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Places the bubble from the settled anchor bounds and restores its stacking.
fn snap_bubble<H: WindowHost + ?Sized>(
    host: &mut H,
    solver: &GeometrySolver,
    mode: AnchorMode,
) -> Option<Point> {
    let anchor = host.anchor_bounds().ok()?;
    let size = host.bubble_size().ok()?;
    let origin = solver.solve(size, mode, anchor);
    host.move_bubble(origin).ok()?;
    let _ = host.raise_bubble();
    Some(origin)
}

/// Swallows the click that the window system delivers right after a drag.
#[derive(Debug, Clone, Default)]
pub struct ClickGuard {
    suppress_until: Option<Instant>,
}

impl ClickGuard {
    pub fn arm(&mut self, now: Instant) {
        self.suppress_until = Some(now + CLICK_COOLDOWN);
    }

    /// True when this click should be ignored.
    pub fn swallow(&mut self, now: Instant) -> bool {
        match self.suppress_until.take() {
            Some(until) if now < until => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::TrayPlacement;
    use crate::host::{HostCall, MemoryHost};

    fn solver() -> GeometrySolver {
        GeometrySolver::default().with_tray_placement(TrayPlacement::Above)
    }

    fn visible_bubble_host() -> MemoryHost {
        let mut host = MemoryHost::new();
        host.set_anchor_bounds(Rect::new(100, 100, 120, 120)).unwrap();
        host.show_bubble().unwrap();
        host.take_calls();
        host
    }

    #[test]
    fn test_bubble_tracks_the_anchor_of_the_same_tick() {
        let mut host = visible_bubble_host();
        let solver = solver();
        let mut drag = DragCoordinator::new();

        host.set_cursor(Point::new(130, 140));
        drag.begin(&host).unwrap();

        let pointers = [Point::new(150, 150), Point::new(400, 90), Point::new(-50, 700)];
        for pointer in pointers {
            host.set_cursor(pointer);
            let DragTick::Moved(frame) = drag.tick(&mut host, &solver, AnchorMode::Pet) else {
                panic!("tick should move");
            };
            let expected_anchor = Rect::new(pointer.x - 30, pointer.y - 40, 120, 120);
            assert_eq!(frame.anchor, expected_anchor);
            assert_eq!(
                frame.bubble,
                Some(solver.solve(Size::new(200, 100), AnchorMode::Pet, expected_anchor))
            );
        }

        // no stacking changes while moving
        assert!(!host.calls().contains(&HostCall::BubbleRaised));
    }

    #[test]
    fn test_end_snaps_to_real_bounds_and_raises_once() {
        let mut host = visible_bubble_host();
        let solver = solver();
        let mut drag = DragCoordinator::new();

        host.set_cursor(Point::new(110, 110));
        drag.begin(&host).unwrap();
        host.set_cursor(Point::new(210, 160));
        drag.tick(&mut host, &solver, AnchorMode::Pet);
        // window manager nudged the pet after the last tick
        host.set_anchor_bounds(Rect::new(205, 150, 120, 120)).unwrap();

        let outcome = drag.end(&mut host, &solver, AnchorMode::Pet).unwrap();
        assert!(outcome.moved);
        assert_eq!(outcome.bubble, Some(Point::new(165, 30)));
        assert_eq!(host.bubble_origin(), Point::new(165, 30));
        let raised = host.calls().iter().filter(|c| **c == HostCall::BubbleRaised).count();
        assert_eq!(raised, 1);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn test_small_gesture_is_a_click() {
        let mut host = visible_bubble_host();
        let solver = solver();
        let mut drag = DragCoordinator::new();

        host.set_cursor(Point::new(150, 150));
        drag.begin(&host).unwrap();
        host.set_cursor(Point::new(153, 147));
        drag.tick(&mut host, &solver, AnchorMode::Pet);
        let outcome = drag.end(&mut host, &solver, AnchorMode::Pet).unwrap();
        assert!(!outcome.moved);
    }

    #[test]
    fn test_torn_down_anchor_cancels() {
        let mut host = visible_bubble_host();
        let solver = solver();
        let mut drag = DragCoordinator::new();

        drag.begin(&host).unwrap();
        host.destroy_anchor();
        assert_eq!(drag.tick(&mut host, &solver, AnchorMode::Pet), DragTick::Cancelled);
        assert!(!drag.is_dragging());
        assert!(drag.end(&mut host, &solver, AnchorMode::Pet).is_none());
    }

    #[test]
    fn test_hidden_bubble_stays_put() {
        let mut host = MemoryHost::new();
        let solver = solver();
        let mut drag = DragCoordinator::new();

        drag.begin(&host).unwrap();
        host.set_cursor(Point::new(500, 500));
        let DragTick::Moved(frame) = drag.tick(&mut host, &solver, AnchorMode::Pet) else {
            panic!("tick should move");
        };
        assert_eq!(frame.bubble, None);
    }

    #[test]
    fn test_idle_tick_is_skipped() {
        let mut host = MemoryHost::new();
        let mut drag = DragCoordinator::new();
        assert_eq!(drag.tick(&mut host, &solver(), AnchorMode::Pet), DragTick::Skipped);
        assert!(drag.end(&mut host, &solver(), AnchorMode::Pet).is_none());
    }

    #[test]
    fn test_click_guard_cooldown() {
        let start = Instant::now();
        let mut guard = ClickGuard::default();
        assert!(!guard.swallow(start));

        guard.arm(start);
        assert!(guard.swallow(start + Duration::from_millis(100)));
        // one click consumed the guard
        assert!(!guard.swallow(start + Duration::from_millis(200)));

        guard.arm(start);
        assert!(!guard.swallow(start + Duration::from_millis(600)));
    }
}
