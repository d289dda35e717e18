use std::cmp::Ordering;
use std::convert::TryFrom;
use std::io::Write;

use crate::memory::{Byte, Ram, Word};
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use log::*;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

/// Number of general purpose registers
pub const NUM_REGISTERS: usize = 8;
/// Register reserved for the stack pointer
pub const SP: usize = 7;
/// Stack pointer value of an empty stack
pub const STACK_TOP: Byte = 0xF4;

/// Comparison flags, set by CMP and read by the conditional jumps.
/// Exactly one of them is set after any comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags {
    /// Equal
    pub e: bool,
    /// Less-than
    pub l: bool,
    /// Greater-than
    pub g: bool,
}

impl Flags {
    fn set(&mut self, ordering: Ordering) {
        self.e = ordering == Ordering::Equal;
        self.l = ordering == Ordering::Less;
        self.g = ordering == Ordering::Greater;
    }
}

/// Operations the ALU can perform on two registers. Resolved at decode
/// time, so an unsupported operation is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Mul,
    Cmp,
}

/// Outcome of an execution step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The instruction completed and execution continues
    Running,
    /// A HLT instruction was reached
    Halted,
    /// The fetched opcode is not part of the instruction set
    Unknown(Byte),
}

/// Emulates a CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Processor {
    /// General purpose registers R0-R7. R7 doubles as the stack pointer.
    pub reg: [Byte; NUM_REGISTERS],
    /// Program counter
    pub pc: Word,
    /// Comparison flags
    pub flags: Flags,
}

impl Default for Processor {
    /// Initializes a new CPU
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Initializes a new CPU with the PC at address 0 and an empty stack
    pub fn new() -> Self {
        let mut reg = [0; NUM_REGISTERS];
        reg[SP] = STACK_TOP;
        Self {
            reg,
            pc: 0,
            flags: Flags::default(),
        }
    }

    fn read_reg(&self, index: Byte) -> Result<Byte> {
        self.reg
            .get(index as usize)
            .copied()
            .ok_or_else(|| eyre!("no register R{}", index))
    }

    fn write_reg(&mut self, index: Byte, value: Byte) -> Result<()> {
        match self.reg.get_mut(index as usize) {
            Some(register) => {
                *register = value;
                Ok(())
            }
            None => Err(eyre!("no register R{}", index)),
        }
    }

    /// ALU operations. Arithmetic wraps modulo 256; CMP only touches the flags.
    fn alu(&mut self, op: AluOp, a: Byte, b: Byte) -> Result<()> {
        let lhs = self.read_reg(a)?;
        let rhs = self.read_reg(b)?;

        match op {
            AluOp::Add => self.write_reg(a, lhs.wrapping_add(rhs))?,
            AluOp::Mul => self.write_reg(a, lhs.wrapping_mul(rhs))?,
            AluOp::Cmp => self.flags.set(lhs.cmp(&rhs)),
        }

        Ok(())
    }

    /// Decrements SP, then writes `value` to the new top of the stack
    fn push(&mut self, memory: &mut Ram, value: Byte) -> Result<()> {
        let sp = self.reg[SP]
            .checked_sub(1)
            .ok_or_else(|| eyre!("stack overflow: cannot push below address 0x00"))?;
        memory.write_byte(sp as Word, value)?;
        self.reg[SP] = sp;

        Ok(())
    }

    /// Reads the top of the stack, then increments SP
    fn pop(&mut self, memory: &Ram) -> Result<Byte> {
        let value = memory.read_byte(self.reg[SP] as Word)?;
        self.reg[SP] = self.reg[SP]
            .checked_add(1)
            .ok_or_else(|| eyre!("stack underflow: cannot pop above address 0xFF"))?;

        Ok(value)
    }

    /// Executes a single decoded instruction
    pub fn execute_instruction<W: Write>(
        &mut self,
        instruction: Instruction,
        memory: &mut Ram,
        out: &mut W,
    ) -> Result<Status> {
        // Where the PC lands unless the instruction assigns it directly
        let next = self.pc + instruction.len();

        match instruction {
            Instruction::LDI => {
                let register = memory.read_byte(self.pc + 1)?;
                let value = memory.read_byte(self.pc + 2)?;
                self.write_reg(register, value)?;
                self.pc = next;

                debug!("LDI R{} {}", register, value);
            }
            Instruction::PRN => {
                let register = memory.read_byte(self.pc + 1)?;
                let value = self.read_reg(register)?;
                writeln!(out, "{}", value).wrap_err("failed to emit PRN output")?;
                self.pc = next;

                debug!("PRN R{}: {}", register, value);
            }
            Instruction::ADD => {
                let a = memory.read_byte(self.pc + 1)?;
                let b = memory.read_byte(self.pc + 2)?;
                self.alu(AluOp::Add, a, b)?;
                self.pc = next;

                debug!("ADD R{} R{}", a, b);
            }
            Instruction::MUL => {
                let a = memory.read_byte(self.pc + 1)?;
                let b = memory.read_byte(self.pc + 2)?;
                self.alu(AluOp::Mul, a, b)?;
                self.pc = next;

                debug!("MUL R{} R{}", a, b);
            }
            Instruction::CMP => {
                let a = memory.read_byte(self.pc + 1)?;
                let b = memory.read_byte(self.pc + 2)?;
                self.alu(AluOp::Cmp, a, b)?;
                self.pc = next;

                debug!("CMP R{} R{}: {:?}", a, b, self.flags);
            }
            Instruction::PUSH => {
                let register = memory.read_byte(self.pc + 1)?;
                let value = self.read_reg(register)?;
                self.push(memory, value)?;
                self.pc = next;

                debug!("PUSH R{}: {}", register, value);
            }
            Instruction::POP => {
                let register = memory.read_byte(self.pc + 1)?;
                let value = self.pop(memory)?;
                self.write_reg(register, value)?;
                self.pc = next;

                debug!("POP R{}: {}", register, value);
            }
            Instruction::CALL => {
                let register = memory.read_byte(self.pc + 1)?;
                // CALL is two bytes, so the return address is always PC + 2
                let return_address = Byte::try_from(next)
                    .map_err(|_| eyre!("return address 0x{:X} does not fit in a byte", next))?;
                self.push(memory, return_address)?;
                let target = self.read_reg(register)?;
                self.pc = target as Word;

                debug!("CALL R{}: 0x{:02X}", register, target);
            }
            Instruction::RET => {
                let return_address = self.pop(memory)?;
                self.pc = return_address as Word;

                debug!("RET: 0x{:02X}", return_address);
            }
            Instruction::JMP => {
                let register = memory.read_byte(self.pc + 1)?;
                self.pc = self.read_reg(register)? as Word;

                debug!("JMP 0x{:02X}", self.pc);
            }
            Instruction::JEQ => {
                let register = memory.read_byte(self.pc + 1)?;
                let target = self.read_reg(register)?;
                self.pc = if self.flags.e { target as Word } else { next };

                debug!("JEQ 0x{:02X}: {}", target, self.flags.e);
            }
            Instruction::JNE => {
                let register = memory.read_byte(self.pc + 1)?;
                let target = self.read_reg(register)?;
                self.pc = if self.flags.e { next } else { target as Word };

                debug!("JNE 0x{:02X}: {}", target, !self.flags.e);
            }
            Instruction::HLT => {
                debug!("HLT");

                return Ok(Status::Halted);
            }
        }

        Ok(Status::Running)
    }

    /// Runs one fetch-decode-execute step.
    ///
    /// An opcode outside the instruction set terminates the run with
    /// [`Status::Unknown`] and leaves the machine state untouched; faults
    /// (bad addresses, bad register indices, stack overflow) are errors.
    pub fn execute<W: Write>(&mut self, memory: &mut Ram, out: &mut W) -> Result<Status> {
        let opcode = memory
            .read_byte(self.pc)
            .wrap_err("program counter ran past the end of memory")?;

        match Instruction::try_from(opcode) {
            Ok(instruction) => {
                trace!("0x{:02X}: {}", self.pc, instruction);
                self.execute_instruction(instruction, memory, out)
            }
            Err(_) => {
                error!("unknown instruction 0x{:02X} at 0x{:02X}", opcode, self.pc);
                Ok(Status::Unknown(opcode))
            }
        }
    }

    /// Runs the program until a termination condition is met
    pub fn execute_until_halt<W: Write>(&mut self, memory: &mut Ram, out: &mut W) -> Result<Status> {
        loop {
            let status = self.execute(memory, out)?;
            if status != Status::Running {
                info!("program terminated at 0x{:02X}", self.pc);
                return Ok(status);
            }
        }
    }

    /// Like [`Processor::execute_until_halt`], but gives up after `max_steps`
    /// instructions so a runaway program cannot loop forever
    pub fn execute_bounded<W: Write>(
        &mut self,
        memory: &mut Ram,
        out: &mut W,
        max_steps: u64,
    ) -> Result<Status> {
        for _ in 0..max_steps {
            let status = self.execute(memory, out)?;
            if status != Status::Running {
                info!("program terminated at 0x{:02X}", self.pc);
                return Ok(status);
            }
        }

        bail!("no HLT after {} instructions, aborting", max_steps)
    }

    /// Renders the PC, the next three memory bytes and all registers.
    /// Handy to log from [`Processor::execute`] when debugging a program.
    pub fn trace(&self, memory: &Ram) -> String {
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            self.pc,
            memory.read_byte(self.pc).unwrap_or(0),
            memory.read_byte(self.pc + 1).unwrap_or(0),
            memory.read_byte(self.pc + 2).unwrap_or(0),
        );

        for value in self.reg.iter() {
            line.push_str(&format!(" {:02X}", value));
        }

        line
    }
}

macro_rules! instructions {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $opcode:literal => $len:literal , )+ ) => {
        /// The instruction set. Each opcode is followed by zero, one or two
        /// operand bytes carrying register indices or an immediate value.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Instruction {
            $(
                $( #[doc = $doc] )+
                $name = $opcode,
            )+
        }

        impl Instruction {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            /// Instruction width in bytes, opcode included
            pub const fn len(&self) -> Word {
                match self {
                    $( Self::$name => $len , )+
                }
            }
        }

        impl ::std::fmt::Display for Instruction {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $( Self::$name => f.write_str(stringify!($name)) , )+
                }
            }
        }
    }
}

instructions! {
    /// Stop execution
    HLT = 0b0000_0001 => 1,
    /// Pop the return address off the stack into the PC
    RET = 0b0001_0001 => 1,
    /// Push the value of a register onto the stack
    PUSH = 0b0100_0101 => 2,
    /// Pop the top of the stack into a register
    POP = 0b0100_0110 => 2,
    /// Print the decimal value of a register
    PRN = 0b0100_0111 => 2,
    /// Push the return address, then jump to the address held in a register
    CALL = 0b0101_0000 => 2,
    /// Jump to the address held in a register
    JMP = 0b0101_0100 => 2,
    /// Jump to the address held in a register if the E flag is set
    JEQ = 0b0101_0101 => 2,
    /// Jump to the address held in a register if the E flag is clear
    JNE = 0b0101_0110 => 2,
    /// Load an immediate value into a register
    LDI = 0b1000_0010 => 3,
    /// Add two registers, storing the result in the first (mod 256)
    ADD = 0b1010_0000 => 3,
    /// Multiply two registers, storing the result in the first (mod 256)
    MUL = 0b1010_0010 => 3,
    /// Compare two registers and set the E/L/G flags
    CMP = 0b1010_0111 => 3,
}
