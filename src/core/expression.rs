use chrono::{Datelike, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{Birthday, Config};
use crate::core::presentation::PresentationState;
use crate::telemetry::Snapshot;

/// Pet face. Every character bundle ships one image per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Normal,
    Birthday,
    Sleep,
    WifiBad,
    WifiGood,
    Hot,
    Cool,
    Hungry,
    Full,
    Noisy,
    Mute,
    FortuneLow,
    FortuneHigh,
}

impl Icon {
    pub fn file_name(&self) -> &'static str {
        match self {
            Icon::Normal => "normal.png",
            Icon::Birthday => "birthday.png",
            Icon::Sleep => "sleep.png",
            Icon::WifiBad => "wifi_bad.png",
            Icon::WifiGood => "wifi_good.png",
            Icon::Hot => "hot.png",
            Icon::Cool => "cool.png",
            Icon::Hungry => "hungry.png",
            Icon::Full => "full.png",
            Icon::Noisy => "noisy.png",
            Icon::Mute => "mute.png",
            Icon::FortuneLow => "fortune_low.png",
            Icon::FortuneHigh => "fortune_high.png",
        }
    }

    /// Path relative to the application root, as the pet window loads it.
    pub fn asset_path(&self, character: &str) -> String {
        format!("assets/{}/{}", character, self.file_name())
    }
}

/// What the pet shows: a face plus the bubble text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub icon: Icon,
    pub title: String,
    pub content: String,
}

impl Expression {
    pub fn new(icon: Icon, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            icon,
            title: title.into(),
            content: content.into(),
        }
    }

    /// Bubble title reduced to what a speech engine can read aloud.
    pub fn speech_text(&self) -> String {
        speech_text(&self.title)
    }
}

/// One proposal for the current cycle. Every candidate is shown when picked.
pub type Candidate = Expression;

pub fn is_birthday(birthday: &Birthday, today: NaiveDate) -> bool {
    birthday.is_set() && birthday.month == today.month() && birthday.day == today.day()
}

/// Builds the full candidate list for one reading. Never empty.
pub fn candidates(snapshot: &Snapshot, today: NaiveDate, birthday: &Birthday) -> Vec<Candidate> {
    let mut list = Vec::new();
    let temp = snapshot.cpu_temperature;
    let battery = snapshot.battery_percent;

    match snapshot.wifi_quality {
        None => list.push(Expression::new(Icon::WifiBad, "인터넷 끊김! 📡", "외로워요...")),
        Some(quality) if quality < 50 => list.push(Expression::new(
            Icon::WifiBad,
            "인터넷 끊김! 📡",
            format!("신호 약함 ({}%)", quality),
        )),
        Some(_) => {}
    }

    if temp >= 60.0 {
        list.push(Expression::new(
            Icon::Hot,
            "앗 뜨거! 🔥",
            format!("CPU가 {}도에요! 열나요!", temp),
        ));
    }

    if battery <= 20 && !snapshot.is_charging {
        list.push(Expression::new(
            Icon::Hungry,
            "배고파요 😭",
            format!("배터리 {}% 남았어요.. 밥 주세요..", battery),
        ));
    }

    if snapshot.volume > 80 && !snapshot.is_muted {
        list.push(Expression::new(
            Icon::Noisy,
            "너무 시끄러워요! 🔊",
            format!("볼륨 {}%... 귀 터지겠어요!", snapshot.volume),
        ));
    }

    if snapshot.is_muted || snapshot.volume == 0 {
        list.push(Expression::new(Icon::Mute, "쉿! 🤫", "조용히 있을게요..."));
    }

    if temp > 0.0 && temp < 45.0 {
        list.push(Expression::new(
            Icon::Cool,
            "아 시원해 ❄️",
            format!("온도 {}도. 아주 쾌적해요!", temp),
        ));
    }

    if battery >= 90 {
        list.push(Expression::new(
            Icon::Full,
            "기분 최고! 😆",
            format!("에너지 {}%! 날아갈 것 같아요.", battery),
        ));
    }

    if snapshot.wifi_quality.is_some_and(|quality| quality >= 80) {
        list.push(Expression::new(Icon::WifiGood, "인터넷 빨라요! 📡", "친구들 만나러 가요!!"));
    }

    list.push(Expression::new(
        Icon::Normal,
        "현재상태 👍",
        format!("배터리 {}%, 온도 {}도", battery, temp),
    ));

    if is_birthday(birthday, today) {
        list.push(Expression::new(
            Icon::Birthday,
            "생일 축하해요! 🎂",
            format!("오늘 하루 행복하세요! (배터리 {}%)", battery),
        ));
    }

    list
}

/// Uniform choice; the baseline and birthday entries weigh the same as the rest.
pub fn pick<R: Rng + ?Sized>(candidates: &[Candidate], rng: &mut R) -> Option<Candidate> {
    candidates.choose(rng).cloned()
}

/// Runs one cycle. `None` while asleep or while a one-off message is on screen,
/// in which case nothing may be rendered.
pub fn evaluate<R: Rng + ?Sized>(
    snapshot: &Snapshot,
    today: NaiveDate,
    config: &Config,
    state: &PresentationState,
    rng: &mut R,
) -> Option<Expression> {
    if !state.accepts_evaluation() {
        return None;
    }
    pick(&candidates(snapshot, today, &config.birthday), rng)
}

/// Face shown between evaluations.
pub fn resting(birthday: &Birthday, sleeping: bool, today: NaiveDate) -> Expression {
    if sleeping {
        Expression::new(Icon::Sleep, "Zzz...", "쿨쿨 자는 중이에요")
    } else if is_birthday(birthday, today) {
        Expression::new(Icon::Birthday, "생일 축하해요! 🎂", "오늘 하루 행복하세요!")
    } else {
        Expression::new(Icon::Normal, "현재상태 👍", "지켜보고 있어요")
    }
}

fn speech_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            matches!(c, '\u{AC00}'..='\u{D7A3}')
                || c.is_ascii_alphanumeric()
                || c.is_whitespace()
                || matches!(c, '.' | ',' | '?' | '!' | '%')
        })
        .collect()
}
