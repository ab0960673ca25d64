use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{config::StepperConfig, limit_switches::LimitState, Axis, Direction};
use crate::hal::Driver;

pub struct StepperAxis {
    config: StepperConfig,
    driver: Arc<dyn Driver>,
    direction: Direction,
    test_mode: bool,
    // Telemetry only, zeroed at limit 1 during calibration.
    position: i32,
}

impl StepperAxis {
    pub fn new(config: StepperConfig, driver: Arc<dyn Driver>) -> Self {
        Self {
            config,
            driver,
            direction: Direction::TowardLimit1,
            test_mode: false,
            position: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn single_step(&mut self, direction: Direction) -> LimitState {
        let driver = self.driver.as_ref();
        driver.digital_write(self.config.dir_pin, direction.level());
        driver.digital_write(self.config.step_pin, true);
        driver.delay_us(self.config.pulse_width_us);
        driver.digital_write(self.config.step_pin, false);

        self.position += match direction {
            Direction::TowardLimit1 => -1,
            Direction::TowardLimit2 => 1,
        };
        self.limit_state()
    }

    fn calibration_step(&mut self, direction: Direction) -> LimitState {
        let state = self.single_step(direction);
        self.driver
            .delay_us(self.config.calibration_step_interval_us);
        state
    }

    fn sweep_exhausted(&self, taken: u32) -> bool {
        self.config
            .calibration_step_limit
            .is_some_and(|limit| taken >= limit)
    }
}

impl Axis for StepperAxis {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn limit_state(&self) -> LimitState {
        self.config.limits.sample(self.driver.as_ref())
    }

    fn calibrate(&mut self) -> u16 {
        info!("Calibrating axis {}", self.config.name);

        // The first step is taken unconditionally so the sweep starts from a
        // fresh reading even when the axis already rests on limit 1.
        let mut state = self.calibration_step(Direction::TowardLimit1);
        let mut taken: u32 = 0;
        while state != LimitState::AtLimit1 {
            if self.sweep_exhausted(taken) {
                warn!(
                    "Axis {}: limit 1 not reached after {} steps, abandoning calibration",
                    self.config.name, taken
                );
                return 0;
            }
            state = self.calibration_step(Direction::TowardLimit1);
            taken += 1;
        }

        self.position = 0;
        let mut travel: u32 = 0;
        while state != LimitState::AtLimit2 {
            if self.sweep_exhausted(travel) {
                warn!(
                    "Axis {}: limit 2 not reached after {} steps, abandoning calibration",
                    self.config.name, travel
                );
                return 0;
            }
            state = self.calibration_step(Direction::TowardLimit2);
            travel += 1;
        }
        self.direction = Direction::TowardLimit2;

        info!("Axis {} travel: {} steps", self.config.name, travel);
        u16::try_from(travel).unwrap_or(u16::MAX)
    }

    fn move_steps(&mut self, direction: Direction, steps: u8, step_delay_ms: u16) -> u8 {
        debug!(
            "Moving axis {} {:?} by {} steps",
            self.config.name, direction, steps
        );
        for done in 0..steps {
            if self.limit_state().blocks(direction) {
                debug!("Axis {} stopped at limit after {} steps", self.config.name, done);
                return done + 1;
            }
            self.single_step(direction);
            self.driver.delay_ms(u32::from(step_delay_ms));
        }
        steps
    }

    fn test_mode(&self) -> bool {
        self.test_mode
    }

    fn set_test_mode(&mut self, enabled: bool) {
        self.test_mode = enabled;
    }

    fn test_tick(&mut self) {
        self.direction = self.limit_state().bounce(self.direction);
        self.single_step(self.direction);
    }

    fn position(&self) -> i32 {
        self.position
    }
}
