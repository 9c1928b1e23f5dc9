//! TWI bootloader for the ATmega328P lighting nodes
//!
//! The protocol engine, command interpreter and flash programmer are plain
//! Rust and run on the host under test. Register access lives in `hal` and is
//! only built for the AVR target.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch, abi_avr_interrupt))]

pub mod bootloader;
pub mod config;
pub mod drivers;
pub mod logger;
pub mod os;
pub mod protocol;

#[cfg(target_arch = "avr")]
pub mod hal;

#[cfg(not(target_arch = "avr"))]
pub mod testing;
