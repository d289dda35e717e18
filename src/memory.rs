use std::error;
use std::fmt;

pub mod parse;

pub type Byte = u8; // 1 byte
pub type Word = u16; // wide enough to address all of RAM plus one-past-the-end

/// Number of addressable memory cells.
pub const RAM_SIZE: usize = 256;

/// Emulates the flat 256-byte memory of the machine.
///
/// Addresses below the initial stack pointer are free for program code and
/// data; addresses at or above it hold the stack, growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ram {
    /// The actual data of the memory
    pub data: [Byte; RAM_SIZE],
}

impl Default for Ram {
    /// Initializes the memory with all cells zeroed
    fn default() -> Self {
        Ram {
            data: [0; RAM_SIZE],
        }
    }
}

impl Ram {
    /// Reads the byte at `address`
    pub fn read_byte(&self, address: Word) -> Result<Byte, MemoryError> {
        self.data
            .get(address as usize)
            .copied()
            .ok_or(MemoryError::OutOfBounds { address })
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, address: Word, value: Byte) -> Result<(), MemoryError> {
        match self.data.get_mut(address as usize) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(MemoryError::OutOfBounds { address }),
        }
    }

    /// Writes an array of bytes to the memory, starting at `position`
    pub fn write_array(&mut self, position: Word, data: &[Byte]) -> Result<(), MemoryError> {
        let start = position as usize;
        let end = start + data.len();
        if end > RAM_SIZE {
            return Err(MemoryError::OutOfBounds {
                address: (end - 1) as Word,
            });
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    OutOfBounds { address: Word },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfBounds { address } => {
                write!(f, "memory has no address `0x{:02X}`", address)
            }
        }
    }
}

impl error::Error for MemoryError {}

/// Writes a block of instructions directly into the memory
#[macro_export]
macro_rules! write_instructions {
    ( $mem:ident : $pos:expr => $( $byte:expr ),+ ) => {
        $mem.write_array($pos, &[
            $(
                $byte as Byte,
            )+
        ])?;
    };
}

#[cfg(test)]
mod tests {
    use crate::processor::Instruction;

    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_read_byte() -> Result<()> {
        let mut mem = Ram::default();
        mem.data[0x2] = 0x12;
        assert_eq!(mem.read_byte(0x2)?, 0x12);

        Ok(())
    }

    #[test]
    fn test_write_byte() -> Result<()> {
        let mut mem = Ram::default();
        mem.write_byte(0x44, 12)?;
        assert_eq!(mem.data[0x44], 12);

        Ok(())
    }

    #[test]
    fn test_read_byte_out_of_bounds() {
        let mem = Ram::default();
        assert_eq!(
            mem.read_byte(0x100),
            Err(MemoryError::OutOfBounds { address: 0x100 })
        );
    }

    #[test]
    fn test_write_byte_out_of_bounds() {
        let mut mem = Ram::default();
        assert_eq!(
            mem.write_byte(0x100, 1),
            Err(MemoryError::OutOfBounds { address: 0x100 })
        );
    }

    #[test]
    fn test_write_array() -> Result<()> {
        let mut mem = Ram::default();
        mem.write_array(0x44, &[0x12, 0x34, 0x56, 0x78])?;
        assert_eq!(mem.data[0x44], 0x12);
        assert_eq!(mem.data[0x45], 0x34);
        assert_eq!(mem.data[0x46], 0x56);
        assert_eq!(mem.data[0x47], 0x78);

        Ok(())
    }

    #[test]
    fn test_write_array_past_end() {
        let mut mem = Ram::default();
        assert_eq!(
            mem.write_array(0xFE, &[1, 2, 3]),
            Err(MemoryError::OutOfBounds { address: 0x100 })
        );
    }

    #[test]
    fn test_write_instructions() -> Result<()> {
        let mut mem = Ram::default();

        mem.write_array(
            0,
            &[
                Instruction::LDI as Byte,
                0,
                42,
                Instruction::PRN as Byte,
                0,
                Instruction::HLT as Byte,
            ],
        )?;

        let mut mem2 = Ram::default();
        use crate::processor::Instruction::*;
        write_instructions!(mem2 : 0 => LDI, 0, 42, PRN, 0, HLT);

        assert_eq!(mem, mem2);

        Ok(())
    }
}
