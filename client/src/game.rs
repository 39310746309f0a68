use crate::input::HeldKeys;
use shared::{step_position, Position, MOVEMENT_SPEED};
use std::time::{Duration, Instant};

/// Lets at most one movement step through per elapsed tick interval.
#[derive(Debug, Clone)]
pub struct MovementClock {
    tick: Duration,
    last_step: Option<Instant>,
}

impl MovementClock {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            last_step: None,
        }
    }

    /// True when a step is due at `now`; the step is then counted as taken.
    pub fn try_step(&mut self, now: Instant) -> bool {
        let due = match self.last_step {
            Some(last) => now.saturating_duration_since(last) >= self.tick,
            None => true,
        };

        if due {
            self.last_step = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last_step = None;
    }
}

/// Integrates held keys into the local player's position at a fixed rate.
#[derive(Debug, Clone)]
pub struct LocalMover {
    clock: MovementClock,
    speed: f32,
}

impl LocalMover {
    pub fn new(tick: Duration) -> Self {
        Self {
            clock: MovementClock::new(tick),
            speed: MOVEMENT_SPEED,
        }
    }

    /// Returns the new position when a tick elapsed and the player actually moved.
    pub fn tick(&mut self, now: Instant, keys: HeldKeys, current: Position) -> Option<Position> {
        if !self.clock.try_step(now) {
            return None;
        }

        let (dx, dy) = keys.displacement(self.speed);
        if dx == 0.0 && dy == 0.0 {
            return None;
        }

        let next = step_position(current, dx, dy);
        if next == current {
            return None;
        }
        Some(next)
    }

    pub fn reset(&mut self) {
        self.clock.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{FIELD_WIDTH, PLAYER_SIZE};

    const TICK: Duration = Duration::from_millis(16);

    fn right() -> HeldKeys {
        HeldKeys {
            right: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_clock_gates_steps() {
        let start = Instant::now();
        let mut clock = MovementClock::new(TICK);

        assert!(clock.try_step(start));
        assert!(!clock.try_step(start + Duration::from_millis(10)));
        assert!(clock.try_step(start + Duration::from_millis(16)));
        assert!(!clock.try_step(start + Duration::from_millis(31)));
        assert!(clock.try_step(start + Duration::from_millis(40)));
    }

    #[test]
    fn test_one_step_per_tick_even_after_long_frame() {
        let start = Instant::now();
        let mut mover = LocalMover::new(TICK);
        let origin = Position::new(100.0, 100.0);

        let first = mover.tick(start, right(), origin).unwrap();
        let second = mover
            .tick(start + Duration::from_millis(200), right(), first)
            .unwrap();

        assert_approx_eq!(first.x, 100.0 + MOVEMENT_SPEED);
        assert_approx_eq!(second.x, 100.0 + 2.0 * MOVEMENT_SPEED);
    }

    #[test]
    fn test_no_move_between_ticks() {
        let start = Instant::now();
        let mut mover = LocalMover::new(TICK);
        let origin = Position::new(100.0, 100.0);

        let moved = mover.tick(start, right(), origin).unwrap();
        assert!(mover
            .tick(start + Duration::from_millis(5), right(), moved)
            .is_none());
    }

    #[test]
    fn test_no_keys_no_move() {
        let mut mover = LocalMover::new(TICK);
        let origin = Position::new(100.0, 100.0);
        assert!(mover
            .tick(Instant::now(), HeldKeys::default(), origin)
            .is_none());
    }

    #[test]
    fn test_blocked_at_edge_reports_no_move() {
        let mut mover = LocalMover::new(TICK);
        let at_edge = Position::new(FIELD_WIDTH - PLAYER_SIZE, 50.0);
        assert!(mover.tick(Instant::now(), right(), at_edge).is_none());
    }

    #[test]
    fn test_diagonal_clamps_each_axis() {
        let mut mover = LocalMover::new(TICK);
        let keys = HeldKeys {
            up: true,
            right: true,
            ..Default::default()
        };
        let corner = Position::new(10.0, 2.0);
        let next = mover.tick(Instant::now(), keys, corner).unwrap();
        assert_approx_eq!(next.x, 10.0 + MOVEMENT_SPEED);
        assert_approx_eq!(next.y, 0.0);
    }
}
