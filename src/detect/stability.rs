//! Turns per-frame classifications into discrete onset and silence events.
//!
//! A vowel fires when it differs from the last emitted one, when a silence
//! gap separates it from the previous emission, or (if a re-emit interval is
//! configured) when the same vowel has been held for that long.  Only true
//! silence frames open a gap; noise and ambiguous frames merely interrupt the
//! silence timer.

use std::time::{Duration, Instant};

use crate::detect::types::Vowel;

/// Events produced by one silence frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SilenceUpdate {
    /// Time since the stretch began; `None` on its first frame.
    pub elapsed: Option<Duration>,
    /// Set once per stretch, on the first frame at or past the timeout.
    pub timed_out: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct StabilityFilter {
    re_emit_interval: Option<Duration>,
    silence_timeout: Duration,
    last_confirmed: Option<Vowel>,
    had_gap: bool,
    silence_start: Option<Instant>,
    timeout_reported: bool,
    last_emit: Option<Instant>,
}

impl StabilityFilter {
    /// `re_emit_interval` enables sustained re-emission of a held vowel.
    pub fn new(re_emit_interval: Option<Duration>, silence_timeout: Duration) -> Self {
        Self {
            re_emit_interval,
            silence_timeout,
            last_confirmed: None,
            had_gap: true,
            silence_start: None,
            timeout_reported: false,
            last_emit: None,
        }
    }

    /// The vowel most recently emitted since the last gap.
    pub fn confirmed(&self) -> Option<Vowel> {
        self.last_confirmed
    }

    pub fn had_gap(&self) -> bool {
        self.had_gap
    }

    /// A detected vowel frame.  Returns `true` when an onset should fire.
    pub fn accept_vowel(&mut self, vowel: Vowel, now: Instant) -> bool {
        self.end_silence();

        let is_new = self.last_confirmed != Some(vowel);
        let sustained = match (self.re_emit_interval, self.last_emit) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if is_new || self.had_gap || sustained {
            self.last_confirmed = Some(vowel);
            self.had_gap = false;
            self.last_emit = Some(now);
            true
        } else {
            false
        }
    }

    /// An audible frame that produced no onset candidate (noise, ambiguous).
    pub fn accept_sound(&mut self) {
        self.end_silence();
    }

    /// A silence frame.
    pub fn accept_silence(&mut self, now: Instant) -> SilenceUpdate {
        let mut update = SilenceUpdate::default();
        match self.silence_start {
            None => self.silence_start = Some(now),
            Some(start) => {
                let elapsed = now.saturating_duration_since(start);
                update.elapsed = Some(elapsed);
                if !self.timeout_reported && elapsed >= self.silence_timeout {
                    self.timeout_reported = true;
                    update.timed_out = Some(elapsed);
                }
            }
        }

        self.had_gap = true;
        self.last_confirmed = None;
        self.last_emit = None;
        update
    }

    /// Back to the initial gap state.
    pub fn reset(&mut self) {
        self.last_confirmed = None;
        self.had_gap = true;
        self.last_emit = None;
        self.end_silence();
    }

    fn end_silence(&mut self) {
        self.silence_start = None;
        self.timeout_reported = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
