use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn moved_to(&self, origin: Point) -> Self {
        Self::new(origin.x, origin.y, self.width, self.height)
    }
}

/// What the bubble hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    /// The pet window is shown.
    Pet,
    /// The pet is hidden, so the bubble attaches to the tray icon.
    Tray,
}

impl AnchorMode {
    pub fn select(show_pet: bool, pet_visible: bool) -> Self {
        if show_pet && pet_visible {
            AnchorMode::Pet
        } else {
            AnchorMode::Tray
        }
    }
}

/// Where the bubble goes relative to the tray icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrayPlacement {
    /// Menu bar at the top of the screen.
    Below,
    /// Task bar at the bottom of the screen.
    Above,
}

impl TrayPlacement {
    pub fn for_current_platform() -> Self {
        if cfg!(target_os = "macos") {
            TrayPlacement::Below
        } else {
            TrayPlacement::Above
        }
    }
}

/// Whether the bubble may leave the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsPolicy {
    FreeFloat,
    ClampTo(Rect),
}

/// Side of the bubble the tail is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TailPosition {
    Top,
    Bottom,
}

/// Places the speech bubble against an anchor rectangle.
///
/// The solver reads nothing but its arguments: a rectangle queried from the live pet
/// window and one computed ahead of the window during a drag are handled the same way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySolver {
    pub pet_gap: i32,
    pub tray_gap: i32,
    pub tray_placement: TrayPlacement,
    pub bounds: BoundsPolicy,
}

impl Default for GeometrySolver {
    fn default() -> Self {
        Self {
            pet_gap: 20,
            tray_gap: 10,
            tray_placement: TrayPlacement::for_current_platform(),
            bounds: BoundsPolicy::FreeFloat,
        }
    }
}

impl GeometrySolver {
    pub fn with_tray_placement(mut self, placement: TrayPlacement) -> Self {
        self.tray_placement = placement;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn solve(&self, bubble: Size, mode: AnchorMode, anchor: Rect) -> Point {
        let x = round_half_up(
            anchor.x as f64 + anchor.width as f64 / 2.0 - bubble.width as f64 / 2.0,
        );
        let y = match (mode, self.tray_placement) {
            (AnchorMode::Pet, _) => anchor.y - bubble.height - self.pet_gap,
            (AnchorMode::Tray, TrayPlacement::Below) => anchor.y + anchor.height + self.tray_gap,
            (AnchorMode::Tray, TrayPlacement::Above) => anchor.y - bubble.height - self.tray_gap,
        };

        match self.bounds {
            BoundsPolicy::FreeFloat => Point::new(x, y),
            BoundsPolicy::ClampTo(area) => Point::new(
                clamp_axis(x, bubble.width, area.x, area.width),
                clamp_axis(y, bubble.height, area.y, area.height),
            ),
        }
    }

    pub fn tail(&self, mode: AnchorMode) -> TailPosition {
        match (mode, self.tray_placement) {
            (AnchorMode::Tray, TrayPlacement::Below) => TailPosition::Top,
            _ => TailPosition::Bottom,
        }
    }
}

/// Rounds .5 towards positive infinity.
fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

fn clamp_axis(start: i32, length: i32, area_start: i32, area_length: i32) -> i32 {
    let max = area_start + area_length - length;
    if max < area_start {
        area_start
    } else {
        start.clamp(area_start, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn solver(placement: TrayPlacement) -> GeometrySolver {
        GeometrySolver::default().with_tray_placement(placement)
    }

    #[test]
    fn test_pet_anchor_centers_above() {
        let pet = Rect::new(1000, 800, 120, 120);
        let point = solver(TrayPlacement::Above).solve(Size::new(200, 100), AnchorMode::Pet, pet);
        assert_eq!(point, Point::new(960, 680));
    }

    #[test]
    fn test_odd_widths_round_half_up() {
        let pet = Rect::new(0, 0, 121, 120);
        let point = solver(TrayPlacement::Above).solve(Size::new(200, 50), AnchorMode::Pet, pet);
        // 0 + 60.5 - 100 = -39.5 -> -39
        assert_eq!(point.x, -39);
    }

    #[test]
    fn test_tray_placement_policies() {
        let tray = Rect::new(1500, 0, 22, 22);
        let below = solver(TrayPlacement::Below).solve(Size::new(200, 100), AnchorMode::Tray, tray);
        assert_eq!(below, Point::new(1411, 32));

        let tray = Rect::new(1500, 1050, 24, 30);
        let above = solver(TrayPlacement::Above).solve(Size::new(200, 100), AnchorMode::Tray, tray);
        assert_eq!(above, Point::new(1412, 940));
    }

    #[test]
    fn test_free_float_leaves_screen() {
        let pet = Rect::new(-300, 10, 120, 120);
        let point = solver(TrayPlacement::Above).solve(Size::new(200, 100), AnchorMode::Pet, pet);
        assert_eq!(point, Point::new(-340, -110));
    }

    #[test]
    fn test_clamp_policy_keeps_bubble_on_screen() {
        let area = Rect::new(0, 0, 1920, 1080);
        let solver = solver(TrayPlacement::Above).with_bounds(BoundsPolicy::ClampTo(area));
        let pet = Rect::new(-300, 10, 120, 120);
        assert_eq!(solver.solve(Size::new(200, 100), AnchorMode::Pet, pet), Point::new(0, 0));

        let pet = Rect::new(1900, 500, 120, 120);
        assert_eq!(solver.solve(Size::new(200, 100), AnchorMode::Pet, pet), Point::new(1720, 380));
    }

    #[test]
    fn test_tail_follows_placement() {
        assert_eq!(solver(TrayPlacement::Below).tail(AnchorMode::Pet), TailPosition::Bottom);
        assert_eq!(solver(TrayPlacement::Below).tail(AnchorMode::Tray), TailPosition::Top);
        assert_eq!(solver(TrayPlacement::Above).tail(AnchorMode::Tray), TailPosition::Bottom);
    }

    #[test]
    fn test_anchor_mode_selection() {
        assert_eq!(AnchorMode::select(true, true), AnchorMode::Pet);
        assert_eq!(AnchorMode::select(true, false), AnchorMode::Tray);
        assert_eq!(AnchorMode::select(false, true), AnchorMode::Tray);
    }

    proptest! {
        #[test]
        fn solve_is_pure(
            x in -4000i32..4000,
            y in -4000i32..4000,
            w in 1i32..400,
            h in 1i32..400,
            bw in 1i32..600,
            bh in 1i32..600,
            pet in any::<bool>(),
        ) {
            let mode = if pet { AnchorMode::Pet } else { AnchorMode::Tray };
            let solver = GeometrySolver::default();
            let anchor = Rect::new(x, y, w, h);
            let simulated = Rect::new(x, y, w, h);
            let first = solver.solve(Size::new(bw, bh), mode, anchor);
            prop_assert_eq!(first, solver.solve(Size::new(bw, bh), mode, anchor));
            prop_assert_eq!(first, solver.solve(Size::new(bw, bh), mode, simulated));
        }
    }
}
