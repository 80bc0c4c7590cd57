//! # Collaborator Interfaces
//!
//! Hardware the kernel's applications talk to but the kernel itself does
//! not implement: GPIO pins and a character UART. These are deliberately
//! minimal trait seams — the demo firmware backs the UART with
//! semihosting and the GPIO with a synthetic signal source, and a real
//! board port supplies register-level implementations instead. Nothing
//! in the scheduler core depends on this module.

/// Logic level of a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Low,
    High,
}

/// General-purpose I/O, addressed by (port, pin).
pub trait Gpio {
    fn read(&self, port: u8, pin: u8) -> PinState;
    fn write(&self, port: u8, pin: u8, state: PinState);
}

/// Character output device.
pub trait Uart {
    /// Configure the device for the given baud rate.
    fn init(&self, baud_rate: u32);

    /// Blocking write of a byte buffer.
    fn put_string(&self, buf: &[u8]);
}
