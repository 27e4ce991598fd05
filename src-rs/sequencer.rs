use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use enigo::{Enigo, Key, Keyboard, Settings};
use tracing::{debug, info, warn};

use crate::classifier::Direction;
use crate::error::InjectionError;

/// Delivers key events for directions. The only platform coupling of the
/// sequencer lives behind this trait.
pub trait KeyInjector {
    fn key_down(&mut self, direction: Direction) -> Result<(), InjectionError>;
    fn key_up(&mut self, direction: Direction) -> Result<(), InjectionError>;
}

/// Arrow keys on the OS keyboard through enigo.
pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> Result<Self, InjectionError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InjectionError::Init(e.to_string()))?;
        Ok(Self { enigo })
    }
}

pub fn arrow_key(direction: Direction) -> Key {
    match direction {
        Direction::Up => Key::UpArrow,
        Direction::Down => Key::DownArrow,
        Direction::Left => Key::LeftArrow,
        Direction::Right => Key::RightArrow,
    }
}

impl KeyInjector for EnigoInjector {
    fn key_down(&mut self, direction: Direction) -> Result<(), InjectionError> {
        self.enigo
            .key(arrow_key(direction), enigo::Direction::Press)
            .map_err(|e| InjectionError::KeyDown(direction, e.to_string()))
    }

    fn key_up(&mut self, direction: Direction) -> Result<(), InjectionError> {
        self.enigo
            .key(arrow_key(direction), enigo::Direction::Release)
            .map_err(|e| InjectionError::KeyUp(direction, e.to_string()))
    }
}

/// Logs key events instead of sending them.
#[derive(Debug, Default)]
pub struct DryRunInjector;

impl KeyInjector for DryRunInjector {
    fn key_down(&mut self, direction: Direction) -> Result<(), InjectionError> {
        info!(%direction, "dry run: key down");
        Ok(())
    }

    fn key_up(&mut self, direction: Direction) -> Result<(), InjectionError> {
        info!(%direction, "dry run: key up");
        Ok(())
    }
}

/// Shared flag checked between key events.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub hold: Duration,
    pub delay: Duration,
}

#[derive(Debug)]
pub struct KeyFailure {
    pub index: usize,
    pub direction: Direction,
    pub error: InjectionError,
}

#[derive(Debug, Default)]
pub struct SequenceReport {
    /// Directions whose down and up events both went through.
    pub sent: usize,
    pub failures: Vec<KeyFailure>,
    pub cancelled: bool,
}

impl SequenceReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.failures.iter().map(|f| f.index).collect();
        indices.dedup();
        indices
    }
}

/// Replays directions in order: down, hold, up, then the inter-key delay
/// before the next one. Failed keys are recorded and skipped.
pub fn execute(
    sequence: &[Direction],
    timing: Timing,
    injector: &mut dyn KeyInjector,
    cancel: Option<&CancelToken>,
) -> SequenceReport {
    let mut report = SequenceReport::default();

    for (index, &direction) in sequence.iter().enumerate() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!(sent = report.sent, remaining = sequence.len() - index, "sequence cancelled");
            report.cancelled = true;
            break;
        }
        if index > 0 && !timing.delay.is_zero() {
            thread::sleep(timing.delay);
        }

        if let Err(error) = injector.key_down(direction) {
            warn!(index, %direction, %error, "key down failed");
            report.failures.push(KeyFailure {
                index,
                direction,
                error,
            });
            continue;
        }
        if !timing.hold.is_zero() {
            thread::sleep(timing.hold);
        }
        match injector.key_up(direction) {
            Ok(()) => {
                debug!(index, %direction, "key sent");
                report.sent += 1;
            }
            Err(error) => {
                warn!(index, %direction, %error, "key up failed");
                report.failures.push(KeyFailure {
                    index,
                    direction,
                    error,
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Down(Direction),
        Up(Direction),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<(Event, Instant)>,
        fail_down_at: Option<usize>,
        downs: usize,
        cancel_after_first: Option<CancelToken>,
    }

    impl KeyInjector for Recorder {
        fn key_down(&mut self, direction: Direction) -> Result<(), InjectionError> {
            let call = self.downs;
            self.downs += 1;
            if self.fail_down_at == Some(call) {
                return Err(InjectionError::KeyDown(direction, "denied".to_string()));
            }
            self.events.push((Event::Down(direction), Instant::now()));
            Ok(())
        }

        fn key_up(&mut self, direction: Direction) -> Result<(), InjectionError> {
            self.events.push((Event::Up(direction), Instant::now()));
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            Ok(())
        }
    }

    #[test]
    fn emits_pairs_in_order_with_hold_and_delay() {
        let mut recorder = Recorder::default();
        let timing = Timing {
            hold: Duration::from_millis(30),
            delay: Duration::from_millis(10),
        };
        let report = execute(&[Direction::Up, Direction::Left], timing, &mut recorder, None);

        assert!(report.is_success());
        assert_eq!(report.sent, 2);
        let kinds: Vec<Event> = recorder.events.iter().map(|(e, _)| *e).collect();
        assert_eq!(
            kinds,
            vec![
                Event::Down(Direction::Up),
                Event::Up(Direction::Up),
                Event::Down(Direction::Left),
                Event::Up(Direction::Left),
            ]
        );

        let at = |i: usize| recorder.events[i].1;
        assert!(at(1) - at(0) >= timing.hold);
        assert!(at(2) - at(1) >= timing.delay);
        assert!(at(3) - at(2) >= timing.hold);
    }

    #[test]
    fn failed_key_is_reported_and_rest_continue() {
        let mut recorder = Recorder {
            fail_down_at: Some(1),
            ..Recorder::default()
        };
        let timing = Timing {
            hold: Duration::ZERO,
            delay: Duration::ZERO,
        };
        let sequence = [Direction::Right, Direction::Down, Direction::Up];
        let report = execute(&sequence, timing, &mut recorder, None);

        assert_eq!(report.sent, 2);
        assert_eq!(report.failed_indices(), vec![1]);
        assert_eq!(report.failures[0].direction, Direction::Down);
        assert!(!report.is_success());
        let downs: Vec<Event> = recorder
            .events
            .iter()
            .map(|(e, _)| *e)
            .filter(|e| matches!(e, Event::Down(_)))
            .collect();
        assert_eq!(downs, vec![Event::Down(Direction::Right), Event::Down(Direction::Up)]);
    }

    #[test]
    fn cancel_stops_between_keys() {
        let token = CancelToken::new();
        let mut recorder = Recorder {
            cancel_after_first: Some(token.clone()),
            ..Recorder::default()
        };
        let timing = Timing {
            hold: Duration::ZERO,
            delay: Duration::ZERO,
        };
        let report = execute(
            &[Direction::Left, Direction::Left, Direction::Right],
            timing,
            &mut recorder,
            Some(&token),
        );

        assert!(report.cancelled);
        assert_eq!(report.sent, 1);
        assert_eq!(recorder.events.len(), 2);
    }

    #[test]
    fn empty_sequence_sends_nothing() {
        let mut recorder = Recorder::default();
        let timing = Timing {
            hold: Duration::from_millis(5),
            delay: Duration::from_millis(5),
        };
        let report = execute(&[], timing, &mut recorder, None);
        assert!(report.is_success());
        assert_eq!(report.sent, 0);
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn every_direction_maps_to_its_arrow_key() {
        assert_eq!(arrow_key(Direction::Up), Key::UpArrow);
        assert_eq!(arrow_key(Direction::Down), Key::DownArrow);
        assert_eq!(arrow_key(Direction::Left), Key::LeftArrow);
        assert_eq!(arrow_key(Direction::Right), Key::RightArrow);
    }
}
