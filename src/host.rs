use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::core::expression::Icon;
use crate::core::geometry::{Point, Rect, Size, TailPosition};
use crate::core::{PetError, Result};

/// Oldest recorded calls are dropped past this many.
pub const CALL_LOG_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderTarget {
    Tray,
    Pet,
}

/// Payload for the speech bubble.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleMessage {
    pub title: String,
    pub content: String,
    pub sound_volume: u8,
    pub icon: Icon,
    pub tail_position: TailPosition,
    pub sound_path: String,
}

/// A line handed to audio / text-to-speech playback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpokenLine {
    pub text: String,
    pub volume: u8,
    pub sound_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    ToggleSleep,
    Fortune,
    Settings,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MenuItem {
    Action { action: MenuAction, label: String },
    Separator,
}

/// Tray context menu, rebuilt whenever its labels change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuModel {
    pub items: Vec<MenuItem>,
}

impl MenuModel {
    pub fn for_state(sleeping: bool) -> Self {
        let action = |action, label: &str| MenuItem::Action {
            action,
            label: label.to_string(),
        };
        Self {
            items: vec![
                action(
                    MenuAction::ToggleSleep,
                    if sleeping { "🌞 깨우기" } else { "💤 재우기" },
                ),
                action(MenuAction::Fortune, "🔮 오늘의 운세"),
                MenuItem::Separator,
                action(MenuAction::Settings, "환경 설정..."),
                MenuItem::Separator,
                action(MenuAction::Quit, "종료"),
            ],
        }
    }

    pub fn label_of(&self, wanted: MenuAction) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            MenuItem::Action { action, label } if *action == wanted => Some(label.as_str()),
            _ => None,
        })
    }
}

/// Tray, pet and bubble rendering. Every method fails with `PetError::WindowGone`
/// once its target has been destroyed.
pub trait Renderer {
    fn update_image(&mut self, target: RenderTarget, asset_path: &str) -> Result<()>;
    fn update_message(&mut self, message: &BubbleMessage) -> Result<()>;
    fn update_tail(&mut self, tail: TailPosition) -> Result<()>;
    fn set_tooltip(&mut self, text: &str) -> Result<()>;
    fn set_menu(&mut self, menu: &MenuModel) -> Result<()>;
    /// Opens the settings form pre-filled with the live configuration.
    fn open_settings(&mut self, config: &Config) -> Result<()>;
}

/// Synchronous window queries; cheap enough to call on every drag tick.
pub trait WindowHost {
    fn cursor_position(&self) -> Result<Point>;
    fn anchor_alive(&self) -> bool;
    fn anchor_visible(&self) -> bool;
    fn set_anchor_visible(&mut self, visible: bool) -> Result<()>;
    fn anchor_bounds(&self) -> Result<Rect>;
    fn set_anchor_bounds(&mut self, rect: Rect) -> Result<()>;
    fn tray_bounds(&self) -> Result<Rect>;
    fn bubble_size(&self) -> Result<Size>;
    fn set_bubble_size(&mut self, size: Size) -> Result<()>;
    fn move_bubble(&mut self, origin: Point) -> Result<()>;
    /// Re-asserts always-on-top stacking.
    fn raise_bubble(&mut self) -> Result<()>;
    fn bubble_visible(&self) -> bool;
    fn show_bubble(&mut self) -> Result<()>;
    fn hide_bubble(&mut self) -> Result<()>;
}

/// Audio and speech playback for messages that are already decided.
pub trait Presenter {
    fn speak(&mut self, line: &SpokenLine) -> Result<()>;
}

/// Everything the in-memory host was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Image { target: RenderTarget, path: String },
    Message(BubbleMessage),
    Tail(TailPosition),
    Tooltip(String),
    Menu(MenuModel),
    Settings(Config),
    Speak(SpokenLine),
    AnchorMoved(Rect),
    AnchorVisible(bool),
    BubbleResized(Size),
    BubbleMoved(Point),
    BubbleRaised,
    BubbleShown,
    BubbleHidden,
}

#[derive(Debug)]
struct MemoryHostState {
    cursor: Point,
    anchor: Rect,
    anchor_alive: bool,
    anchor_visible: bool,
    tray: Rect,
    bubble: Rect,
    bubble_visible: bool,
    calls: Vec<HostCall>,
}

/// Window host without a windowing system: keeps geometry in memory and logs every
/// render. Backs `traypet run --headless` and the tests. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    state: Arc<Mutex<MemoryHostState>>,
    log_renders: bool,
}

impl MemoryHost {
    /// Pet in the bottom-right corner of a 1920x1080 work area, tray icon at the bottom.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryHostState {
                cursor: Point::default(),
                anchor: Rect::new(1920 - 160, 1080 - 160, 120, 120),
                anchor_alive: true,
                anchor_visible: true,
                tray: Rect::new(1780, 1050, 24, 30),
                bubble: Rect::new(0, 0, 200, 100),
                bubble_visible: false,
                calls: Vec::new(),
            })),
            log_renders: false,
        }
    }

    pub fn with_logging(mut self) -> Self {
        self.log_renders = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryHostState> {
        // a panicking test thread must not hide what was recorded
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: HostCall) {
        if self.log_renders {
            match &call {
                HostCall::Image { target, path } => info!(?target, %path, "image"),
                HostCall::Message(message) => {
                    info!(title = %message.title, content = %message.content, "bubble message")
                }
                HostCall::Tooltip(text) => info!(%text, "tooltip"),
                HostCall::Settings(config) => info!(?config, "settings opened"),
                HostCall::Speak(line) => info!(text = %line.text, volume = line.volume, "speak"),
                HostCall::BubbleShown => info!("bubble shown"),
                HostCall::BubbleHidden => info!("bubble hidden"),
                _ => {}
            }
        }
        let mut state = self.lock();
        if state.calls.len() >= CALL_LOG_LIMIT {
            let excess = state.calls.len() + 1 - CALL_LOG_LIMIT / 2;
            state.calls.drain(..excess);
        }
        state.calls.push(call);
    }

    fn anchor_guard(&self) -> Result<()> {
        if self.lock().anchor_alive {
            Ok(())
        } else {
            Err(PetError::WindowGone("pet"))
        }
    }

    pub fn set_cursor(&self, point: Point) {
        self.lock().cursor = point;
    }

    pub fn set_tray(&self, rect: Rect) {
        self.lock().tray = rect;
    }

    /// Simulates the pet window being closed by the window system.
    pub fn destroy_anchor(&self) {
        self.lock().anchor_alive = false;
    }

    pub fn bubble_origin(&self) -> Point {
        self.lock().bubble.origin()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut self.lock().calls)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MemoryHost {
    fn update_image(&mut self, target: RenderTarget, asset_path: &str) -> Result<()> {
        if target == RenderTarget::Pet {
            self.anchor_guard()?;
        }
        self.record(HostCall::Image {
            target,
            path: asset_path.to_string(),
        });
        Ok(())
    }

    fn update_message(&mut self, message: &BubbleMessage) -> Result<()> {
        self.record(HostCall::Message(message.clone()));
        Ok(())
    }

    fn update_tail(&mut self, tail: TailPosition) -> Result<()> {
        self.record(HostCall::Tail(tail));
        Ok(())
    }

    fn set_tooltip(&mut self, text: &str) -> Result<()> {
        self.record(HostCall::Tooltip(text.to_string()));
        Ok(())
    }

    fn set_menu(&mut self, menu: &MenuModel) -> Result<()> {
        self.record(HostCall::Menu(menu.clone()));
        Ok(())
    }

    fn open_settings(&mut self, config: &Config) -> Result<()> {
        self.record(HostCall::Settings(config.clone()));
        Ok(())
    }
}

impl WindowHost for MemoryHost {
    fn cursor_position(&self) -> Result<Point> {
        Ok(self.lock().cursor)
    }

    fn anchor_alive(&self) -> bool {
        self.lock().anchor_alive
    }

    fn anchor_visible(&self) -> bool {
        let state = self.lock();
        state.anchor_alive && state.anchor_visible
    }

    fn set_anchor_visible(&mut self, visible: bool) -> Result<()> {
        self.anchor_guard()?;
        self.lock().anchor_visible = visible;
        self.record(HostCall::AnchorVisible(visible));
        Ok(())
    }

    fn anchor_bounds(&self) -> Result<Rect> {
        self.anchor_guard()?;
        Ok(self.lock().anchor)
    }

    fn set_anchor_bounds(&mut self, rect: Rect) -> Result<()> {
        self.anchor_guard()?;
        self.lock().anchor = rect;
        self.record(HostCall::AnchorMoved(rect));
        Ok(())
    }

    fn tray_bounds(&self) -> Result<Rect> {
        Ok(self.lock().tray)
    }

    fn bubble_size(&self) -> Result<Size> {
        Ok(self.lock().bubble.size())
    }

    fn set_bubble_size(&mut self, size: Size) -> Result<()> {
        {
            let mut state = self.lock();
            state.bubble.width = size.width;
            state.bubble.height = size.height;
        }
        self.record(HostCall::BubbleResized(size));
        Ok(())
    }

    fn move_bubble(&mut self, origin: Point) -> Result<()> {
        {
            let mut state = self.lock();
            state.bubble = state.bubble.moved_to(origin);
        }
        self.record(HostCall::BubbleMoved(origin));
        Ok(())
    }

    fn raise_bubble(&mut self) -> Result<()> {
        self.record(HostCall::BubbleRaised);
        Ok(())
    }

    fn bubble_visible(&self) -> bool {
        self.lock().bubble_visible
    }

    fn show_bubble(&mut self) -> Result<()> {
        self.lock().bubble_visible = true;
        self.record(HostCall::BubbleShown);
        Ok(())
    }

    fn hide_bubble(&mut self) -> Result<()> {
        self.lock().bubble_visible = false;
        self.record(HostCall::BubbleHidden);
        Ok(())
    }
}

impl Presenter for MemoryHost {
    fn speak(&mut self, line: &SpokenLine) -> Result<()> {
        self.record(HostCall::Speak(line.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_label_follows_sleep_state() {
        assert_eq!(
            MenuModel::for_state(false).label_of(MenuAction::ToggleSleep),
            Some("💤 재우기")
        );
        assert_eq!(
            MenuModel::for_state(true).label_of(MenuAction::ToggleSleep),
            Some("🌞 깨우기")
        );
    }

    #[test]
    fn test_destroyed_anchor_rejects_pet_calls() {
        let mut host = MemoryHost::new();
        host.destroy_anchor();
        assert!(matches!(host.anchor_bounds(), Err(PetError::WindowGone(_))));
        assert!(host.update_image(RenderTarget::Pet, "assets/pig/normal.png").is_err());
        assert!(host.update_image(RenderTarget::Tray, "assets/pig/normal.png").is_ok());
        assert!(!host.anchor_visible());
    }

    #[test]
    fn test_clones_share_recorded_calls() {
        let mut host = MemoryHost::new();
        let observer = host.clone();
        host.show_bubble().unwrap();
        assert!(observer.bubble_visible());
        assert_eq!(observer.calls(), vec![HostCall::BubbleShown]);
    }

    #[test]
    fn test_call_log_is_bounded() {
        let mut host = MemoryHost::new();
        for _ in 0..(CALL_LOG_LIMIT * 3) {
            host.raise_bubble().unwrap();
        }
        host.show_bubble().unwrap();
        let calls = host.calls();
        assert!(calls.len() <= CALL_LOG_LIMIT);
        assert_eq!(calls.last(), Some(&HostCall::BubbleShown));
    }
}
