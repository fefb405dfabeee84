use std::sync::Arc;

use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigStore};
use crate::core::drag::{DragTick, DRAG_TICK};
use crate::core::expression::{self, Expression};
use crate::core::fortune;
use crate::core::geometry::{AnchorMode, GeometrySolver, Rect, Size};
use crate::core::{ClickGuard, DragCoordinator, PresentationState, Result};
use crate::host::{BubbleMessage, MenuAction, MenuModel, Presenter, RenderTarget, Renderer, SpokenLine, WindowHost};
use crate::scheduler::RepeatingTimer;
use crate::telemetry::{Snapshot, SystemSampler};

const TOOLTIP_AWAKE: &str = "노는 중...";
const TOOLTIP_ASLEEP: &str = "Zzz...";

/// Everything that can happen to the pet. Processed one at a time, in order.
#[derive(Debug, Clone)]
pub enum PetEvent {
    /// Status timer fired.
    Tick,
    /// A telemetry read finished off the loop.
    Sampled(std::result::Result<Snapshot, String>),
    ToggleSleep,
    RequestFortune,
    /// Explicit restore of the non-temporary expression.
    Restore,
    TrayClicked,
    AnchorClicked,
    /// The bubble's close button.
    DismissBubble,
    /// The bubble measured its content.
    ResizeBubble(Size),
    UpdateConfig(Config),
    Menu(MenuAction),
    BeginDrag,
    DragTick,
    EndDrag,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Cheap, cloneable way to talk to a running controller.
#[derive(Debug, Clone)]
pub struct PetHandle {
    tx: UnboundedSender<PetEvent>,
}

impl PetHandle {
    /// False once the controller has stopped.
    pub fn send(&self, event: PetEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Resolves once the controller has stopped and dropped its queue.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Single owner of configuration and presentation state.
///
/// All mutation happens inside `handle`, driven by one event queue: timers, telemetry
/// results and user actions never run concurrently with each other.
pub struct PetController<H> {
    config: Config,
    state: PresentationState,
    host: H,
    store: Box<dyn ConfigStore + Send>,
    sampler: Arc<dyn SystemSampler>,
    solver: GeometrySolver,
    drag: DragCoordinator,
    click_guard: ClickGuard,
    status_timer: RepeatingTimer,
    drag_timer: RepeatingTimer,
    /// A telemetry read is in flight; further ticks are dropped until it lands.
    sampling: bool,
    rng: StdRng,
    today: Box<dyn Fn() -> NaiveDate + Send>,
    tx: UnboundedSender<PetEvent>,
    rx: UnboundedReceiver<PetEvent>,
}

impl<H> PetController<H>
where
    H: WindowHost + Renderer + Presenter,
{
    pub fn new<S>(host: H, store: S, sampler: Arc<dyn SystemSampler>) -> Self
    where
        S: ConfigStore + Send + 'static,
    {
        let config = store.load();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            state: PresentationState::default(),
            host,
            store: Box::new(store),
            sampler,
            solver: GeometrySolver::default(),
            drag: DragCoordinator::new(),
            click_guard: ClickGuard::default(),
            status_timer: RepeatingTimer::new("status"),
            drag_timer: RepeatingTimer::new("drag"),
            sampling: false,
            rng: StdRng::from_entropy(),
            today: Box::new(|| Local::now().date_naive()),
            tx,
            rx,
        }
    }

    pub fn with_solver(mut self, solver: GeometrySolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_today<F>(mut self, today: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + 'static,
    {
        self.today = Box::new(today);
        self
    }

    pub fn sender(&self) -> PetHandle {
        PetHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn is_status_timer_running(&self) -> bool {
        self.status_timer.is_running()
    }

    pub fn is_drag_timer_running(&self) -> bool {
        self.drag_timer.is_running()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Runs until `Shutdown` or `Quit`.
    pub async fn run(mut self) {
        self.startup();
        while let Some(event) = self.rx.recv().await {
            if self.handle(event) == Flow::Stop {
                break;
            }
        }
        self.shutdown();
    }

    /// Paints the resting face and arms the status timer, which queues the first evaluation.
    pub fn startup(&mut self) {
        info!(
            character = %self.config.character,
            interval_ms = self.config.interval,
            show_pet = self.config.show_pet,
            "pet starting"
        );
        let menu = MenuModel::for_state(self.state.sleeping);
        deliver("menu", self.host.set_menu(&menu));
        deliver("tooltip", self.host.set_tooltip(TOOLTIP_AWAKE));
        if self.host.anchor_alive() {
            deliver("pet visibility", self.host.set_anchor_visible(self.config.show_pet));
        }

        let resting = self.resting_expression();
        self.set_face(&resting);
        self.state.record(resting);
        let tail = self.solver.tail(self.anchor_mode());
        deliver("tail", self.host.update_tail(tail));

        self.start_status_check();
    }

    /// Waits for the next queued event and handles it.
    pub async fn step(&mut self) -> Option<Flow> {
        let event = self.rx.recv().await?;
        Some(self.handle(event))
    }

    pub fn handle(&mut self, event: PetEvent) -> Flow {
        match event {
            PetEvent::Tick => self.request_evaluation(),
            PetEvent::Sampled(result) => self.on_sampled(result),
            PetEvent::ToggleSleep => self.toggle_sleep(),
            PetEvent::RequestFortune => self.request_fortune(),
            PetEvent::Restore => {
                self.restore();
            }
            PetEvent::TrayClicked => {
                if !self.state.sleeping {
                    self.toggle_bubble();
                }
            }
            PetEvent::AnchorClicked => self.anchor_clicked(),
            PetEvent::DismissBubble => {
                self.restore();
                deliver("hide bubble", self.host.hide_bubble());
            }
            PetEvent::ResizeBubble(size) => {
                deliver("bubble resize", self.host.set_bubble_size(size));
                self.reposition_bubble();
            }
            PetEvent::UpdateConfig(config) => self.update_config(config),
            PetEvent::Menu(action) => return self.menu(action),
            PetEvent::BeginDrag => self.begin_drag(),
            PetEvent::DragTick => self.drag_tick(),
            PetEvent::EndDrag => self.end_drag(),
            PetEvent::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn menu(&mut self, action: MenuAction) -> Flow {
        match action {
            MenuAction::ToggleSleep => self.toggle_sleep(),
            MenuAction::Fortune => self.request_fortune(),
            MenuAction::Settings => deliver("settings", self.host.open_settings(&self.config)),
            MenuAction::Quit => return Flow::Stop,
        }
        Flow::Continue
    }

    fn shutdown(&mut self) {
        self.status_timer.cancel();
        self.drag_timer.cancel();
        info!("pet stopped");
    }

    fn start_status_check(&mut self) {
        self.status_timer
            .restart(self.config.interval_duration(), self.tx.clone(), PetEvent::Tick);
    }

    /// Starts a telemetry read unless the pet is asleep, overridden or already reading.
    fn request_evaluation(&mut self) {
        if !self.state.accepts_evaluation() {
            debug!(
                sleeping = self.state.sleeping,
                temp_override = self.state.temp_override_active,
                "evaluation suppressed"
            );
            return;
        }
        if self.sampling {
            debug!("evaluation already in flight");
            return;
        }
        self.sampling = true;

        let sampler = Arc::clone(&self.sampler);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || sampler.sample()).await {
                Ok(Ok(snapshot)) => Ok(snapshot),
                Ok(Err(err)) => Err(err.to_string()),
                Err(err) => Err(err.to_string()),
            };
            let _ = tx.send(PetEvent::Sampled(result));
        });
    }

    fn on_sampled(&mut self, result: std::result::Result<Snapshot, String>) {
        self.sampling = false;
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                warn!(%reason, "telemetry read failed, skipping this cycle");
                return;
            }
        };

        let today = (self.today)();
        match expression::evaluate(&snapshot, today, &self.config, &self.state, &mut self.rng) {
            Some(pick) => {
                info!(icon = ?pick.icon, title = %pick.title, content = %pick.content, "expression picked");
                self.present(pick);
            }
            None => debug!("mode changed while sampling, dropping reading"),
        }
    }

    /// Pushes an expression to tray, pet and bubble and makes sure the bubble is up.
    fn present(&mut self, expression: Expression) {
        self.set_face(&expression);

        let message = BubbleMessage {
            title: expression.title.clone(),
            content: expression.content.clone(),
            sound_volume: self.config.sound_volume,
            icon: expression.icon,
            tail_position: self.solver.tail(self.anchor_mode()),
            sound_path: self.sound_path(),
        };
        deliver("bubble message", self.host.update_message(&message));

        let line = SpokenLine {
            text: expression.speech_text(),
            volume: self.config.sound_volume,
            sound_path: self.sound_path(),
        };
        deliver("speech", self.host.speak(&line));

        if !self.host.bubble_visible() {
            self.show_bubble();
        }
        self.state.record(expression);
    }

    fn set_face(&mut self, expression: &Expression) {
        let path = expression.icon.asset_path(&self.config.character);
        deliver("tray image", self.host.update_image(RenderTarget::Tray, &path));
        if self.host.anchor_alive() {
            deliver("pet image", self.host.update_image(RenderTarget::Pet, &path));
        }
    }

    fn sound_path(&self) -> String {
        format!("assets/{}/voice.mp3", self.config.character)
    }

    fn resting_expression(&self) -> Expression {
        expression::resting(&self.config.birthday, self.state.sleeping, (self.today)())
    }

    fn anchor_mode(&self) -> AnchorMode {
        AnchorMode::select(self.config.show_pet, self.host.anchor_visible())
    }

    /// Live bounds of whatever the bubble currently hangs off.
    fn live_anchor(&self, mode: AnchorMode) -> Result<Rect> {
        match mode {
            AnchorMode::Pet => self.host.anchor_bounds(),
            AnchorMode::Tray => self.host.tray_bounds(),
        }
    }

    fn reposition_bubble(&mut self) {
        let mode = self.anchor_mode();
        let placed = self.live_anchor(mode).and_then(|anchor| {
            let size = self.host.bubble_size()?;
            let origin = self.solver.solve(size, mode, anchor);
            self.host.move_bubble(origin)
        });
        deliver("bubble position", placed);
    }

    fn show_bubble(&mut self) {
        self.reposition_bubble();
        deliver("show bubble", self.host.show_bubble());
        deliver("raise bubble", self.host.raise_bubble());
    }

    fn toggle_bubble(&mut self) {
        if self.host.bubble_visible() {
            deliver("hide bubble", self.host.hide_bubble());
        } else {
            self.show_bubble();
        }
    }

    fn toggle_sleep(&mut self) {
        let sleeping = self.state.toggle_sleep();
        info!(sleeping, "sleep toggled");
        if sleeping {
            // the bubble goes away, and with it any one-off message
            self.state.end_override();
        }

        let menu = MenuModel::for_state(sleeping);
        deliver("menu", self.host.set_menu(&menu));
        let resting = self.resting_expression();
        self.set_face(&resting);
        self.state.record(resting);

        if sleeping {
            deliver("hide bubble", self.host.hide_bubble());
            deliver("tooltip", self.host.set_tooltip(TOOLTIP_ASLEEP));
        } else {
            deliver("tooltip", self.host.set_tooltip(TOOLTIP_AWAKE));
            self.request_evaluation();
        }
    }

    fn request_fortune(&mut self) {
        if self.state.sleeping {
            debug!("fortune ignored while asleep");
            return;
        }
        if !self.config.birthday.is_complete() {
            info!("fortune requested without a complete birthday");
            self.present(fortune::cannot_read());
            return;
        }

        let fortune = fortune::generate(&self.config.birthday, (self.today)());
        info!(score = fortune.score, seed = fortune.seed, "fortune generated");
        let expression = fortune.to_expression();
        self.state.begin_override(expression.clone());
        self.present(expression);
    }

    /// Leaves temp-override mode. Returns false when there was nothing to restore.
    fn restore(&mut self) -> bool {
        if !self.state.end_override() {
            return false;
        }
        let resting = self.resting_expression();
        debug!(icon = ?resting.icon, "restoring resting expression");
        self.set_face(&resting);
        let message = BubbleMessage {
            title: resting.title.clone(),
            content: resting.content.clone(),
            sound_volume: self.config.sound_volume,
            icon: resting.icon,
            tail_position: self.solver.tail(self.anchor_mode()),
            sound_path: self.sound_path(),
        };
        deliver("bubble message", self.host.update_message(&message));
        self.state.record(resting);
        self.request_evaluation();
        true
    }

    fn anchor_clicked(&mut self) {
        let now = tokio::time::Instant::now().into_std();
        if self.click_guard.swallow(now) {
            debug!("click right after drag swallowed");
            return;
        }
        if self.restore() {
            return;
        }
        if !self.state.sleeping {
            self.toggle_bubble();
        }
    }

    fn update_config(&mut self, incoming: Config) {
        let incoming = self.store.validate(incoming);
        let interval_changed = incoming.interval != self.config.interval;
        let character_changed = incoming.character != self.config.character;
        let show_pet_changed = incoming.show_pet != self.config.show_pet;
        let birthday_changed = incoming.birthday != self.config.birthday;

        self.config = incoming;
        if let Err(err) = self.store.save(&self.config) {
            warn!(%err, "failed saving config");
        }
        info!(
            interval_changed,
            character_changed,
            show_pet_changed,
            birthday_changed,
            "config updated"
        );

        if show_pet_changed {
            if self.host.anchor_alive() {
                deliver("pet visibility", self.host.set_anchor_visible(self.config.show_pet));
            }
            let tail = self.solver.tail(self.anchor_mode());
            deliver("tail", self.host.update_tail(tail));
            if self.host.bubble_visible() {
                self.reposition_bubble();
            }
        }

        if character_changed {
            let resting = self.resting_expression();
            self.set_face(&resting);
        }

        if interval_changed {
            // restarting queues an evaluation of its own
            self.start_status_check();
        } else if character_changed || birthday_changed {
            self.request_evaluation();
        }
    }

    fn begin_drag(&mut self) {
        if self.anchor_mode() != AnchorMode::Pet {
            debug!("drag ignored, pet is hidden");
            return;
        }
        if let Err(err) = self.drag.begin(&self.host) {
            debug!(%err, "could not start drag");
            return;
        }
        self.drag_timer
            .start(DRAG_TICK, false, self.tx.clone(), PetEvent::DragTick);
    }

    fn drag_tick(&mut self) {
        let mode = self.anchor_mode();
        if let DragTick::Cancelled = self.drag.tick(&mut self.host, &self.solver, mode) {
            self.drag_timer.cancel();
        }
    }

    fn end_drag(&mut self) {
        self.drag_timer.cancel();
        let mode = self.anchor_mode();
        if let Some(outcome) = self.drag.end(&mut self.host, &self.solver, mode) {
            if outcome.moved {
                self.click_guard.arm(tokio::time::Instant::now().into_std());
            }
        }
    }
}

/// Render failures never propagate; a vanished window just means nothing to draw on.
fn deliver(what: &'static str, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_gone() => debug!(what, "render target gone"),
        Err(err) => warn!(what, %err, "render call failed"),
    }
}
