//! Preview playback of one direction sequence
//!
//! The state machine owns no timer. Each transition returns the delay after
//! which the caller should deliver the next [`Playback::on_timeout`].

use std::time::Duration;

use crate::data::AnimationSequence;

/// Engine ticks per second
pub const TICKS_PER_SECOND: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing { frame: usize },
}

#[derive(Debug, Clone)]
pub struct Playback {
    state: PlaybackState,
    durations: Vec<u32>,
    /// Frame shown while stopped and where playing resumes
    current: usize,
    speed: f64,
}

impl Playback {
    pub fn new(sequence: &AnimationSequence) -> Self {
        Self {
            state: PlaybackState::Stopped,
            durations: sequence.durations(),
            current: 0,
            speed: 1.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_frame(&self) -> Option<usize> {
        (!self.durations.is_empty()).then_some(self.current)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing { .. })
    }

    /// Playback speed multiplier. Non-positive values are ignored.
    pub fn set_speed(&mut self, speed: f64) {
        if speed > 0.0 {
            self.speed = speed;
        }
    }

    /// Swaps in an edited sequence and stops playback.
    pub fn set_sequence(&mut self, sequence: &AnimationSequence) {
        self.durations = sequence.durations();
        self.current = self.current.min(self.durations.len().saturating_sub(1));
        self.state = PlaybackState::Stopped;
    }

    /// Selects a frame, e.g. from a slider. Playing continues from there.
    pub fn seek(&mut self, frame: usize) {
        if frame < self.durations.len() {
            self.current = frame;
            if self.is_playing() {
                self.state = PlaybackState::Playing { frame };
            }
        }
    }

    fn delay(&self, frame: usize) -> Duration {
        let ticks = self.durations.get(frame).copied().unwrap_or(0);
        Duration::from_secs_f64(f64::from(ticks) / TICKS_PER_SECOND / self.speed)
    }

    /// Starts playing from the current frame. Returns the delay to arm, or
    /// `None` when there is nothing to play.
    pub fn play(&mut self) -> Option<Duration> {
        if self.durations.is_empty() {
            return None;
        }
        self.state = PlaybackState::Playing {
            frame: self.current,
        };
        Some(self.delay(self.current))
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    pub fn toggle(&mut self) -> Option<Duration> {
        if self.is_playing() {
            self.stop();
            None
        } else {
            self.play()
        }
    }

    /// Advances to the next frame, wrapping around, and returns the delay to
    /// re-arm. Timeouts arriving after `stop` are ignored.
    pub fn on_timeout(&mut self) -> Option<Duration> {
        let PlaybackState::Playing { frame } = self.state else {
            return None;
        };
        if self.durations.is_empty() {
            self.state = PlaybackState::Stopped;
            return None;
        }
        let next = (frame + 1) % self.durations.len();
        self.current = next;
        self.state = PlaybackState::Playing { frame: next };
        Some(self.delay(next))
    }
}
