use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Host builds only exercise the protocol core and its tests
    let target = env::var("TARGET").unwrap_or_default();
    if !target.contains("avr") {
        return;
    }

    // Configure for ATmega328P
    println!("cargo:rustc-link-arg=-mmcu=atmega328p");

    // Boot section: the last 4KB of flash (BOOTSZ = 2048 words)
    println!("cargo:rustc-link-arg=-Wl,--section-start=.text=0x7000");

    println!("cargo:warning=Building lighting node bootloader for ATmega328P at 8MHz");
}
