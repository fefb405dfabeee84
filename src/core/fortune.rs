use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::config::Birthday;
use crate::core::expression::{Expression, Icon};

const SEED_MODULUS: u64 = 100_000;

/// Flavor text and the face that goes with it.
const TABLE: [(&str, Icon); 10] = [
    ("오늘은 뭐든 잘 풀리는 날! 자신감을 가져요.", Icon::Full),
    ("작은 친절이 큰 행운으로 돌아와요.", Icon::Normal),
    ("생각지 못한 곳에서 반가운 소식이 와요.", Icon::WifiGood),
    ("무리하지 말고 쉬엄쉬엄 가요.", Icon::Cool),
    ("새로운 걸 시작하기 좋은 날이에요!", Icon::Full),
    ("오늘은 조심조심, 서두르면 넘어져요.", Icon::Hungry),
    ("맛있는 걸 먹으면 운이 올라가요!", Icon::Birthday),
    ("친구에게 먼저 연락해 보세요.", Icon::WifiGood),
    ("차분하게 정리하면 길이 보여요.", Icon::Normal),
    ("열정이 넘치는 하루! 너무 뜨거워지진 말아요.", Icon::Hot),
];

const LUCKY_ITEMS: [&str; 8] = [
    "따뜻한 커피",
    "연필",
    "이어폰",
    "초콜릿",
    "우산",
    "손수건",
    "동전",
    "노트",
];

const LUCKY_COLORS: [&str; 7] = ["빨강", "주황", "노랑", "초록", "파랑", "남색", "보라"];

/// Today's fortune. Same birthday and date, same fortune.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fortune {
    pub seed: u64,
    /// 50..=100
    pub score: u32,
    pub text: &'static str,
    pub icon: Icon,
    pub lucky_item: &'static str,
    pub lucky_color: &'static str,
}

impl Fortune {
    pub fn to_expression(&self) -> Expression {
        Expression::new(
            self.icon,
            format!("🔮 오늘의 운세 {}점", self.score),
            format!(
                "{}\n행운의 아이템: {} / 행운의 색: {}",
                self.text, self.lucky_item, self.lucky_color
            ),
        )
    }
}

/// Shown instead of a fortune when the birthday is incomplete.
pub fn cannot_read() -> Expression {
    Expression::new(
        Icon::Normal,
        "🔮 운세를 볼 수 없어요",
        "설정에서 생일(연도, 월, 일)을 먼저 알려주세요!",
    )
}

/// Folds the decimal digits of both dates into a seed below 100000.
pub fn seed_for(birthday: &Birthday, today: NaiveDate) -> u64 {
    let digits = format!(
        "{}{}{}{}{}{}",
        birthday.year,
        birthday.month,
        birthday.day,
        today.year(),
        today.month(),
        today.day()
    );
    digits
        .chars()
        .fold(0u64, |seed, c| (seed * 31 + c as u64) % SEED_MODULUS)
}

/// Callers must check `Birthday::is_complete` first.
pub fn generate(birthday: &Birthday, today: NaiveDate) -> Fortune {
    let seed = seed_for(birthday, today);
    let score = (seed % 51) as u32 + 50;
    let (text, table_icon) = TABLE[(seed % TABLE.len() as u64) as usize];

    let icon = if score < 60 {
        Icon::FortuneLow
    } else if score > 90 {
        Icon::FortuneHigh
    } else {
        table_icon
    };

    Fortune {
        seed,
        score,
        text,
        icon,
        lucky_item: LUCKY_ITEMS[(seed % LUCKY_ITEMS.len() as u64) as usize],
        lucky_color: LUCKY_COLORS[((seed * 2) % LUCKY_COLORS.len() as u64) as usize],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_known_fortune_is_reproducible() {
        let birthday = Birthday { year: 1990, month: 1, day: 1 };
        let today = date(2024, 2, 5);

        let first = generate(&birthday, today);
        assert_eq!(first.seed, 97282);
        assert_eq!(first.score, 75);
        assert_eq!(first.text, TABLE[2].0);
        assert_eq!(first.icon, Icon::WifiGood);
        assert_eq!(first.lucky_item, "이어폰");
        assert_eq!(first.lucky_color, "보라");

        for _ in 0..5 {
            assert_eq!(generate(&birthday, today), first);
        }
    }

    #[test]
    fn test_low_score_overrides_icon() {
        let fortune = generate(&Birthday { year: 1995, month: 1, day: 20 }, date(2024, 3, 14));
        assert_eq!(fortune.seed, 62475);
        assert_eq!(fortune.score, 50);
        assert_eq!(fortune.icon, Icon::FortuneLow);
        assert_eq!(fortune.text, TABLE[5].0);
        assert_eq!(fortune.lucky_item, "초콜릿");
        assert_eq!(fortune.lucky_color, "빨강");
    }

    #[test]
    fn test_high_score_overrides_icon() {
        let fortune = generate(&Birthday { year: 1995, month: 1, day: 1 }, date(2024, 3, 14));
        assert_eq!(fortune.seed, 19986);
        assert_eq!(fortune.score, 95);
        assert_eq!(fortune.icon, Icon::FortuneHigh);
    }

    #[test]
    fn test_fortune_expression_text() {
        let fortune = generate(&Birthday { year: 1990, month: 1, day: 1 }, date(2024, 2, 5));
        let expression = fortune.to_expression();
        assert_eq!(expression.title, "🔮 오늘의 운세 75점");
        assert!(expression.content.ends_with("행운의 아이템: 이어폰 / 행운의 색: 보라"));
    }

    proptest! {
        #[test]
        fn score_stays_in_range(
            year in 1900i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
            offset in 0i64..20_000,
        ) {
            let today = date(2000, 1, 1) + chrono::Duration::days(offset);
            let fortune = generate(&Birthday { year, month, day }, today);
            prop_assert!((50..=100).contains(&fortune.score));
            prop_assert!(fortune.seed < SEED_MODULUS);
        }
    }
}
