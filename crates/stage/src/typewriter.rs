use std::time::Duration;

const FAST: Duration = Duration::from_millis(20);
const NORMAL: Duration = Duration::from_millis(50);
const SLOW: Duration = Duration::from_millis(150);
/// Ceiling for numeric speeds.
pub const MAX_DELAY: Duration = Duration::from_secs(10);

/// Extra pause multiplier after a character.
fn pause_after(c: char) -> u32 {
    match c {
        ',' | '，' | '、' => 3,
        '.' | '!' | '?' | '。' | '！' | '？' => 6,
        _ => 0,
    }
}

/// Per-character delay for a speed cell: `Fast`, `Normal`, `Slow`, or seconds.
/// Missing, invalid, zero or negative values give the normal speed; large
/// values are capped at [`MAX_DELAY`].
pub fn delay_for_speed(speed: Option<&str>) -> Duration {
    let Some(speed) = speed.map(str::trim) else {
        return NORMAL;
    };
    match speed.to_ascii_lowercase().as_str() {
        "fast" => FAST,
        "normal" => NORMAL,
        "slow" => SLOW,
        other => match other.parse::<f64>() {
            Ok(secs) if secs > 0.0 && secs.is_finite() => Duration::try_from_secs_f64(secs)
                .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY)),
            _ => NORMAL,
        },
    }
}

/// Reveals a line one character at a time as clock ticks arrive.
#[derive(Debug, Clone)]
pub struct Typewriter {
    chars: Vec<char>,
    revealed: usize,
    delay: Duration,
    elapsed: Duration,
}

impl Typewriter {
    pub fn new(text: &str, speed: Option<&str>) -> Self {
        Self::with_delay(text, delay_for_speed(speed))
    }

    pub fn with_delay(text: &str, delay: Duration) -> Self {
        Self {
            chars: text.chars().collect(),
            revealed: 0,
            delay,
            elapsed: Duration::ZERO,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Advance the clock. Returns how many characters became visible.
    pub fn tick(&mut self, dt: Duration) -> usize {
        if self.is_done() {
            return 0;
        }
        self.elapsed = self.elapsed.saturating_add(dt);
        let before = self.revealed;
        while self.revealed < self.chars.len() {
            let cost = self.cost_of_next();
            if self.elapsed < cost {
                break;
            }
            self.elapsed -= cost;
            self.revealed += 1;
        }
        if self.is_done() {
            self.elapsed = Duration::ZERO;
        }
        self.revealed - before
    }

    /// Reveal everything now.
    pub fn finish(&mut self) {
        self.revealed = self.chars.len();
        self.elapsed = Duration::ZERO;
    }

    pub fn is_done(&self) -> bool {
        self.revealed >= self.chars.len()
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn visible_text(&self) -> String {
        self.chars[..self.revealed].iter().collect()
    }

    pub fn full_text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Time until the whole line is visible, from the current position.
    pub fn remaining(&self) -> Duration {
        let mut total = Duration::ZERO;
        for index in self.revealed..self.chars.len() {
            total = total.saturating_add(self.cost_at(index));
        }
        total.saturating_sub(self.elapsed)
    }

    fn cost_of_next(&self) -> Duration {
        self.cost_at(self.revealed)
    }

    /// Base delay plus the pause owed to the preceding non-blank character.
    fn cost_at(&self, index: usize) -> Duration {
        let pause = index
            .checked_sub(1)
            .and_then(|prev| self.chars.get(prev))
            .filter(|c| !c.is_whitespace())
            .map_or(0, |c| pause_after(*c));
        self.delay.saturating_add(self.delay.saturating_mul(pause))
    }
}
