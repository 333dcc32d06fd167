//! Typewriter reveal animations.
//!
//! Progress is computed from elapsed time rather than counted ticks, so the
//! reveal rate stays fixed no matter how often the UI calls [`Typewriter::tick`].

use std::time::{Duration, Instant};

/// Granularity of a reveal step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealUnit {
    Chars,
    /// Space-separated words
    Words,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingSpeed {
    pub unit: RevealUnit,
    /// Units revealed per tick
    pub per_tick: usize,
    pub tick: Duration,
}

impl TypingSpeed {
    pub const CODE: TypingSpeed = TypingSpeed {
        unit: RevealUnit::Chars,
        per_tick: 15,
        tick: Duration::from_millis(10),
    };

    pub const THOUGHT: TypingSpeed = TypingSpeed {
        unit: RevealUnit::Words,
        per_tick: 2,
        tick: Duration::from_millis(50),
    };
}

/// What happens to in-flight reveals when a new one starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingPolicy {
    /// Finish every other reveal immediately
    Supersede,
    /// Let reveals run side by side
    Concurrent,
}

/// Progress for one key: `shown` is a byte length into the revealed text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealUpdate {
    pub key: String,
    pub shown: usize,
    pub done: bool,
}

#[derive(Debug, Clone)]
struct Reveal {
    key: String,
    /// Byte offset at which each unit ends
    stops: Vec<usize>,
    started: Instant,
    shown_units: usize,
}

impl Reveal {
    fn new(key: &str, text: &str, unit: RevealUnit, started: Instant) -> Self {
        let stops = match unit {
            RevealUnit::Chars => text
                .char_indices()
                .map(|(i, c)| i + c.len_utf8())
                .collect(),
            RevealUnit::Words => text
                .match_indices(' ')
                .map(|(i, _)| i)
                .chain(std::iter::once(text.len()))
                .collect(),
        };
        Self {
            key: key.to_string(),
            stops,
            started,
            shown_units: 0,
        }
    }

    fn byte_len(&self, units: usize) -> usize {
        match units {
            0 => 0,
            n => self.stops[n.min(self.stops.len()) - 1],
        }
    }

    fn finished(self) -> RevealUpdate {
        let shown = self.byte_len(self.stops.len());
        RevealUpdate {
            key: self.key,
            shown,
            done: true,
        }
    }
}

/// Drives reveal animations for one lane (code or thoughts)
#[derive(Debug, Clone)]
pub struct Typewriter {
    speed: TypingSpeed,
    policy: TypingPolicy,
    active: Vec<Reveal>,
}

impl Typewriter {
    pub fn new(speed: TypingSpeed, policy: TypingPolicy) -> Self {
        Self {
            speed,
            policy,
            active: Vec::new(),
        }
    }

    /// Start revealing `text` under `key` from empty.
    ///
    /// A running reveal for the same key is replaced. Returns completion
    /// updates for reveals finished early by the lane's policy.
    pub fn start(&mut self, key: &str, text: &str, now: Instant) -> Vec<RevealUpdate> {
        self.active.retain(|r| r.key != key);
        let finished = match self.policy {
            TypingPolicy::Supersede => self.finish_all(),
            TypingPolicy::Concurrent => Vec::new(),
        };
        self.active
            .push(Reveal::new(key, text, self.speed.unit, now));
        finished
    }

    /// Advance every reveal to `now`
    pub fn tick(&mut self, now: Instant) -> Vec<RevealUpdate> {
        let speed = self.speed;
        let tick_nanos = speed.tick.as_nanos().max(1);
        let mut updates = Vec::new();

        self.active.retain_mut(|reveal| {
            let ticks = now.saturating_duration_since(reveal.started).as_nanos() / tick_nanos;
            if ticks == 0 {
                return true;
            }
            let total = reveal.stops.len();
            let units = usize::try_from(ticks)
                .unwrap_or(usize::MAX)
                .saturating_mul(speed.per_tick)
                .min(total);
            let done = units >= total;
            if done || units != reveal.shown_units {
                reveal.shown_units = units;
                updates.push(RevealUpdate {
                    key: reveal.key.clone(),
                    shown: reveal.byte_len(units),
                    done,
                });
            }
            !done
        });

        updates
    }

    /// Drop a reveal without completing it
    pub fn cancel(&mut self, key: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|r| r.key != key);
        self.active.len() != before
    }

    /// Complete every reveal immediately
    pub fn finish_all(&mut self) -> Vec<RevealUpdate> {
        self.active.drain(..).map(Reveal::finished).collect()
    }

    #[cfg(test)]
    pub fn is_active(&self, key: &str) -> bool {
        self.active.iter().any(|r| r.key == key)
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_code_reveals_fifteen_chars_per_tick() {
        let text = "x".repeat(40);
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::CODE, TypingPolicy::Supersede);
        tw.start("a.ts", &text, t0);

        assert!(tw.tick(t0 + ms(5)).is_empty());

        let updates = tw.tick(t0 + ms(10));
        assert_eq!(updates[0].shown, 15);
        assert!(!updates[0].done);

        let updates = tw.tick(t0 + ms(25));
        assert_eq!(updates[0].shown, 30);

        let updates = tw.tick(t0 + ms(30));
        assert_eq!(updates[0].shown, 40);
        assert!(updates[0].done);
        assert!(tw.is_idle());
    }

    #[test]
    fn test_exact_multiple_finishes_on_last_tick() {
        let text = "y".repeat(30);
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::CODE, TypingPolicy::Supersede);
        tw.start("f", &text, t0);
        let updates = tw.tick(t0 + ms(20));
        assert_eq!(updates[0].shown, 30);
        assert!(updates[0].done);
    }

    #[test]
    fn test_thought_reveals_two_words_per_tick() {
        let text = "one two three four five";
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::THOUGHT, TypingPolicy::Concurrent);
        tw.start("t1", text, t0);

        let updates = tw.tick(t0 + ms(50));
        assert_eq!(&text[..updates[0].shown], "one two");

        let updates = tw.tick(t0 + ms(100));
        assert_eq!(&text[..updates[0].shown], "one two three four");

        let updates = tw.tick(t0 + ms(150));
        assert_eq!(updates[0].shown, text.len());
        assert!(updates[0].done);
    }

    #[test]
    fn test_chars_respect_utf8_boundaries() {
        let text = "héllo";
        let t0 = Instant::now();
        let speed = TypingSpeed {
            per_tick: 2,
            ..TypingSpeed::CODE
        };
        let mut tw = Typewriter::new(speed, TypingPolicy::Supersede);
        tw.start("f", text, t0);
        let updates = tw.tick(t0 + ms(10));
        assert_eq!(&text[..updates[0].shown], "hé");
    }

    #[test]
    fn test_supersede_finishes_previous_reveal() {
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::CODE, TypingPolicy::Supersede);
        tw.start("a.ts", &"a".repeat(100), t0);
        tw.tick(t0 + ms(10));

        let finished = tw.start("b.ts", "bbb", t0 + ms(15));
        assert_eq!(
            finished,
            vec![RevealUpdate {
                key: "a.ts".to_string(),
                shown: 100,
                done: true,
            }]
        );
        assert!(tw.is_active("b.ts"));
        assert_eq!(tw.active_count(), 1);
    }

    #[test]
    fn test_concurrent_reveals_run_side_by_side() {
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::THOUGHT, TypingPolicy::Concurrent);
        assert!(tw.start("1", "a b c d", t0).is_empty());
        assert!(tw.start("2", "e f g h", t0 + ms(25)).is_empty());
        assert_eq!(tw.active_count(), 2);

        let updates = tw.tick(t0 + ms(80));
        assert_eq!(updates.len(), 2);
    }

    #[test]
    fn test_restart_same_key_starts_from_empty() {
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::CODE, TypingPolicy::Supersede);
        tw.start("a", &"a".repeat(60), t0);
        tw.tick(t0 + ms(20));
        let finished = tw.start("a", &"a".repeat(60), t0 + ms(20));
        assert!(finished.is_empty());
        let updates = tw.tick(t0 + ms(30));
        assert_eq!(updates[0].shown, 15);
    }

    #[test]
    fn test_empty_text_completes_on_first_tick() {
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::CODE, TypingPolicy::Supersede);
        tw.start("empty", "", t0);
        let updates = tw.tick(t0 + ms(10));
        assert_eq!(updates[0].shown, 0);
        assert!(updates[0].done);
    }

    #[test]
    fn test_cancel_and_finish_all() {
        let t0 = Instant::now();
        let mut tw = Typewriter::new(TypingSpeed::THOUGHT, TypingPolicy::Concurrent);
        tw.start("1", "a b", t0);
        tw.start("2", "c d", t0);
        assert!(tw.cancel("1"));
        assert!(!tw.cancel("1"));
        let finished = tw.finish_all();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].shown, 3);
        assert!(tw.is_idle());
    }
}
