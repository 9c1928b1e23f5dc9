#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]

#[cfg(target_arch = "avr")]
use panic_halt as _;

#[cfg(target_arch = "avr")]
#[avr_device::entry]
fn main() -> ! {
    use embedded_hal::blocking::delay::DelayMs;
    use lightnode_bootloader::bootloader::Bootloader;
    use lightnode_bootloader::config::{BOOT_SETTLE_MS, NODE_ADDRESS};
    use lightnode_bootloader::hal::{self, Delay, Eeprom, GlobalInterrupts, Power, SelfProgram, SharedBus, TwiSlave, Watchdog};
    use lightnode_bootloader::logger::{Event, Log};
    use lightnode_bootloader::protocol::BusLink;

    let mut watchdog = Watchdog::new();
    let reset_cause = watchdog.take_reset_cause();
    watchdog.disable();

    #[cfg(not(feature = "debug"))]
    let log = lightnode_bootloader::logger::PulseLog::new(hal::DebugPin::new(), Delay::new());
    #[cfg(feature = "debug")]
    let log = lightnode_bootloader::logger::ConsoleLog::new(hal::Usart0::new());

    let mut node = Bootloader::new(NODE_ADDRESS, SelfProgram, Eeprom, GlobalInterrupts, log);
    node.log_mut().record(Event::Started { reset_cause });

    let mut bus = SharedBus;
    let mut power = Power::new();
    let mut delay = Delay::new();

    hal::select_boot_vectors(true);
    TwiSlave::init(NODE_ADDRESS);
    unsafe { avr_device::interrupt::enable() };

    loop {
        let deferred = node.has_deferred_work();
        power.sleep_unless(|| bus.frame_ready() || (deferred && !bus.is_busy()));

        if let Some(launch) = node.step(&mut bus) {
            delay.delay_ms(BOOT_SETTLE_MS);
            hal::jump_to_application(launch.entry_word);
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {}
