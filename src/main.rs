use std::env;
use std::io;

use color_eyre::eyre::{eyre, Result};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use ls8::memory::Ram;
use ls8::processor::Processor;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap(); // logging

    let path = env::args()
        .nth(1)
        .ok_or_else(|| eyre!("usage: ls8 <program image>"))?;

    let mut memory = Ram::from_file(&path)?;
    let mut cpu = Processor::new();

    cpu.execute_until_halt(&mut memory, &mut io::stdout())?;

    Ok(())
}
