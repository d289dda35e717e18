//! Emulator for the LS-8, an 8-bit CPU with eight general purpose
//! registers, 256 bytes of RAM and a downward-growing stack.

pub mod memory;
pub mod processor;
