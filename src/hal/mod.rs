pub mod sim;

use std::{sync::Arc, time::Duration};

pub type Pin = u8;

pub type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Change,
}

pub trait Driver: Send + Sync {
    fn digital_read(&self, pin: Pin) -> bool;
    fn digital_write(&self, pin: Pin, high: bool);
    fn pwm_write(&self, pin: Pin, duty: u8);

    fn delay_us(&self, us: u32);
    fn delay_ms(&self, ms: u32);

    fn attach_interrupt(&self, pin: Pin, edge: Edge, handler: Handler);
    fn set_interrupt_enabled(&self, pin: Pin, enabled: bool);

    fn every(&self, interval: Duration, handler: Handler);
}
