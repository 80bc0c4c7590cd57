//! # Cadence Demo Firmware
//!
//! Recreates the classic periodic EDF demo application on top of the
//! Cadence kernel: six periodic tasks sharing one message queue of
//! capacity 10, scheduled Earliest-Deadline-First.
//!
//! | Task | Period | Role |
//! |------|--------|------|
//! | `button_1_monitor` | 50 | Edge-detects button 1, reports edges |
//! | `button_2_monitor` | 50 | Edge-detects button 2, reports edges |
//! | `periodic_transmitter` | 100 | Sends a fixed status message |
//! | `uart_receiver` | 20 | Drains the queue to the UART |
//! | `load_1_simulation` | 10 | Busy-loop CPU load |
//! | `load_2_simulation` | 100 | Busy-loop CPU load |
//!
//! The button monitors and transmitter send with a 5-tick timeout; the
//! receiver blocks up to 5 ticks per receive. A tick hook pulses a
//! heartbeat pin once per tick.
//!
//! GPIO and UART are collaborator traits ([`cadence::io`]): this demo
//! backs the UART with semihosting and the buttons with a synthetic
//! toggling signal, so it runs on any Cortex-M4 target without a board
//! support package. Load simulation likewise stands in for real
//! workloads — it is an application concern, not a kernel one.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod firmware {
    use core::hint::black_box;
    use core::sync::atomic::{AtomicU32, Ordering};

    use cortex_m_rt::entry;
    use cortex_m_semihosting::hio;
    use panic_halt as _;

    use cadence::io::{Gpio, PinState, Uart};
    use cadence::kernel;
    use cadence::policy::SchedPolicy;
    use cadence::queue::Message;
    use cadence::time::TickType;

    /// The demo's single queue. First (and only) queue created, so its
    /// id is 0.
    const MESSAGE_QUEUE: usize = 0;

    /// Wait budget for queue operations, in ticks.
    const QUEUE_TIMEOUT: TickType = 5;

    // -----------------------------------------------------------------------
    // Collaborators
    // -----------------------------------------------------------------------

    /// Synthetic button source: each pin toggles every 32 reads, which
    /// produces a steady stream of rising and falling edges for the
    /// monitors to report. A board port would read real pins here.
    struct DemoGpio {
        reads: AtomicU32,
    }

    impl Gpio for DemoGpio {
        fn read(&self, _port: u8, pin: u8) -> PinState {
            let n = self.reads.fetch_add(1, Ordering::Relaxed);
            if ((n / 32) + pin as u32) % 2 == 0 {
                PinState::Low
            } else {
                PinState::High
            }
        }

        fn write(&self, _port: u8, _pin: u8, _state: PinState) {
            // Heartbeat sink; no physical pin in the hosted demo.
        }
    }

    /// UART collaborator backed by semihosting.
    struct SemihostUart;

    impl Uart for SemihostUart {
        fn init(&self, _baud_rate: u32) {
            // Semihosting needs no configuration.
        }

        fn put_string(&self, buf: &[u8]) {
            if let Ok(mut out) = hio::hstdout() {
                let _ = out.write_all(buf);
            }
        }
    }

    static GPIO: DemoGpio = DemoGpio {
        reads: AtomicU32::new(0),
    };
    static UART: SemihostUart = SemihostUart;

    /// Tick hook: one heartbeat pulse per tick, the same shape as the
    /// original application's tick hook.
    fn heartbeat() {
        GPIO.write(0, 0, PinState::High);
        GPIO.write(0, 0, PinState::Low);
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Sample one button pin and send an edge report when it changed.
    fn monitor_button(tag: u32, pin: u8, rising: &str, falling: &str) -> ! {
        kernel::set_task_tag(tag);
        let mut last_wake = kernel::get_tick_count();
        let mut prev = GPIO.read(1, pin);
        loop {
            let curr = GPIO.read(1, pin);
            if curr != prev {
                let text = if curr == PinState::High { rising } else { falling };
                let msg = Message::from_text(tag as u8, text);
                prev = curr;
                // A full queue past the timeout drops this edge report;
                // the next edge will be reported normally.
                let _ = kernel::send_to_back(MESSAGE_QUEUE, &msg, QUEUE_TIMEOUT);
            }
            kernel::delay_until(&mut last_wake, 50);
        }
    }

    extern "C" fn button_1_monitor(_param: *mut ()) -> ! {
        monitor_button(1, 0, "Button_1_Rising_Edge", "Button_1_Falling_Edge")
    }

    extern "C" fn button_2_monitor(_param: *mut ()) -> ! {
        monitor_button(2, 1, "Button_2_Rising_Edge", "Button_2_Falling_Edge")
    }

    extern "C" fn periodic_transmitter(_param: *mut ()) -> ! {
        kernel::set_task_tag(3);
        let mut last_wake = kernel::get_tick_count();
        let msg = Message::from_text(b'3', "Periodic_Transmitter");
        loop {
            let _ = kernel::send_to_back(MESSAGE_QUEUE, &msg, QUEUE_TIMEOUT);
            kernel::delay_until(&mut last_wake, 100);
        }
    }

    extern "C" fn uart_receiver(_param: *mut ()) -> ! {
        kernel::set_task_tag(4);
        let mut last_wake = kernel::get_tick_count();
        loop {
            if let Ok(msg) = kernel::receive(MESSAGE_QUEUE, QUEUE_TIMEOUT) {
                UART.put_string(&msg.data);
            }
            kernel::delay_until(&mut last_wake, 20);
        }
    }

    /// Busy-loop for roughly `iterations` loop bodies of CPU time.
    fn simulate_load(iterations: u32) {
        let mut acc: u32 = 0;
        for i in 0..iterations {
            acc = black_box(acc.wrapping_add(i));
        }
        black_box(acc);
    }

    extern "C" fn load_1_simulation(_param: *mut ()) -> ! {
        kernel::set_task_tag(5);
        let mut last_wake = kernel::get_tick_count();
        loop {
            simulate_load(5 * 6_666);
            kernel::delay_until(&mut last_wake, 10);
        }
    }

    extern "C" fn load_2_simulation(_param: *mut ()) -> ! {
        kernel::set_task_tag(6);
        let mut last_wake = kernel::get_tick_count();
        loop {
            simulate_load(12 * 6_666);
            kernel::delay_until(&mut last_wake, 100);
        }
    }

    // -----------------------------------------------------------------------
    // Entry point
    // -----------------------------------------------------------------------

    /// Firmware entry: hardware setup, queue and task creation, then
    /// scheduler launch. Never returns; any creation failure here is an
    /// unrecoverable resource exhaustion and halts via panic.
    #[entry]
    fn main() -> ! {
        let cp = cortex_m::Peripherals::take().expect("core peripherals taken twice");

        UART.init(115_200);

        kernel::init(SchedPolicy::EarliestDeadline);
        kernel::set_tick_hook(heartbeat);

        let queue = kernel::create_queue(10).expect("queue pool exhausted");
        assert_eq!(queue, MESSAGE_QUEUE);

        let null = core::ptr::null_mut();
        kernel::create_periodic(button_1_monitor, "Button_1_Monitor", null, 0, 50)
            .expect("task pool exhausted");
        kernel::create_periodic(button_2_monitor, "Button_2_Monitor", null, 0, 50)
            .expect("task pool exhausted");
        kernel::create_periodic(periodic_transmitter, "Periodic_Transmitter", null, 0, 100)
            .expect("task pool exhausted");
        kernel::create_periodic(uart_receiver, "Uart_Receiver", null, 0, 20)
            .expect("task pool exhausted");
        kernel::create_periodic(load_1_simulation, "Load_1_Simulation", null, 0, 10)
            .expect("task pool exhausted");
        kernel::create_periodic(load_2_simulation, "Load_2_Simulation", null, 0, 100)
            .expect("task pool exhausted");

        kernel::start(cp)
    }
}

/// The demo only runs on hardware; host builds get a stub so the crate's
/// library and tests still build everywhere.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn main() {}
