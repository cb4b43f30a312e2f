//! Ordered subscriber lists for detector events.

use std::time::Duration;

use crate::detect::types::{DetectionResult, Vowel};
use crate::pipeline::DetectorError;

pub type VowelCallback = Box<dyn FnMut(Vowel, &DetectionResult) + Send>;
pub type SilenceCallback = Box<dyn FnMut(Duration) + Send>;
pub type ErrorCallback = Box<dyn FnMut(&DetectorError) + Send>;

/// Callbacks run synchronously, in subscription order, on the thread that
/// ticks the detector.
#[derive(Default)]
pub struct EventEmitter {
    vowel: Vec<VowelCallback>,
    silence: Vec<SilenceCallback>,
    silence_timeout: Vec<SilenceCallback>,
    error: Vec<ErrorCallback>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_vowel_detected(&mut self, cb: impl FnMut(Vowel, &DetectionResult) + Send + 'static) {
        self.vowel.push(Box::new(cb));
    }

    pub fn on_silence(&mut self, cb: impl FnMut(Duration) + Send + 'static) {
        self.silence.push(Box::new(cb));
    }

    pub fn on_silence_timeout(&mut self, cb: impl FnMut(Duration) + Send + 'static) {
        self.silence_timeout.push(Box::new(cb));
    }

    pub fn on_error(&mut self, cb: impl FnMut(&DetectorError) + Send + 'static) {
        self.error.push(Box::new(cb));
    }

    pub fn emit_vowel(&mut self, vowel: Vowel, result: &DetectionResult) {
        log::debug!("event: vowel {vowel} ({:.2})", result.confidence);
        self.vowel.iter_mut().for_each(|cb| cb(vowel, result));
    }

    pub fn emit_silence(&mut self, elapsed: Duration) {
        self.silence.iter_mut().for_each(|cb| cb(elapsed));
    }

    pub fn emit_silence_timeout(&mut self, elapsed: Duration) {
        log::debug!("event: silence timeout after {} ms", elapsed.as_millis());
        self.silence_timeout.iter_mut().for_each(|cb| cb(elapsed));
    }

    pub fn emit_error(&mut self, err: &DetectorError) {
        self.error.iter_mut().for_each(|cb| cb(err));
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("vowel", &self.vowel.len())
            .field("silence", &self.silence.len())
            .field("silence_timeout", &self.silence_timeout.len())
            .field("error", &self.error.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[test]
    fn subscribers_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::new();
        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            emitter.on_vowel_detected(move |v, _| log.lock().unwrap().push(format!("{tag}:{v}")));
        }

        let result = DetectionResult::silence(-10.0, Instant::now());
        emitter.emit_vowel(Vowel::I, &result);
        assert_eq!(*log.lock().unwrap(), vec!["first:I", "second:I", "third:I"]);
    }

    #[test]
    fn event_types_are_independent() {
        let silences = Arc::new(Mutex::new(Vec::new()));
        let timeouts = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(0));
        let mut emitter = EventEmitter::new();
        {
            let silences = Arc::clone(&silences);
            emitter.on_silence(move |d| silences.lock().unwrap().push(d));
        }
        {
            let timeouts = Arc::clone(&timeouts);
            emitter.on_silence_timeout(move |d| timeouts.lock().unwrap().push(d));
        }
        {
            let errors = Arc::clone(&errors);
            emitter.on_error(move |_| *errors.lock().unwrap() += 1);
        }

        emitter.emit_silence(Duration::from_millis(30));
        emitter.emit_silence_timeout(Duration::from_millis(1_500));
        emitter.emit_error(&DetectorError::Inference("boom".into()));

        assert_eq!(*silences.lock().unwrap(), vec![Duration::from_millis(30)]);
        assert_eq!(*timeouts.lock().unwrap(), vec![Duration::from_millis(1_500)]);
        assert_eq!(*errors.lock().unwrap(), 1);
    }

    #[test]
    fn emitting_without_subscribers_is_a_noop() {
        let mut emitter = EventEmitter::new();
        emitter.emit_silence(Duration::ZERO);
        assert!(format!("{emitter:?}").contains("silence: 0"));
    }
}
