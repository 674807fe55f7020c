//! The `.zbc` precompiled bytecode container.
//!
//! Five back-to-back records, one per event in the fixed order
//! init, file, rec, rules, exit. Each record is a little-endian `u16`
//! payload length followed by that many raw bytecode bytes. No header, no
//! checksum, no version field; the format is not safe to move between
//! machines that disagree on operand endianness (this implementation pins
//! little-endian).

use std::io::{self, Read, Write};

use thiserror::Error;
use zed_types::ast::EVENT_COUNT;
use zed_types::{Diagnostic, ErrorKind};

use crate::compiler::CompiledProgram;
use crate::error::CompileError;
use crate::isa;

/// Errors reading a `.zbc` file.
#[derive(Debug, Error)]
pub enum ZbcError {
    #[error("truncated bytecode file: {0}")]
    Truncated(String),
    #[error("trailing bytes after the fifth event program")]
    TrailingBytes,
    #[error("event program {event} is malformed: {source}")]
    Malformed {
        event: usize,
        source: isa::InvalidBytecode,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<ZbcError> for Diagnostic {
    fn from(e: ZbcError) -> Diagnostic {
        Diagnostic::new(ErrorKind::Io, e.to_string(), 0)
    }
}

/// Write the five event programs back to back.
///
/// Fails with [`CompileError::BytecodeOverflow`] if any event program no
/// longer fits the 16-bit length prefix (cannot happen for compiler
/// output, which checks sizes while emitting).
pub fn write_zbc<W: Write>(writer: &mut W, program: &CompiledProgram) -> io::Result<()> {
    for event in &program.events {
        let len = u16::try_from(event.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                CompileError::BytecodeOverflow {
                    what: "event program length",
                    offset: 0,
                }
                .to_string(),
            )
        })?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(event)?;
    }
    Ok(())
}

/// Read five event programs, refusing short files and trailing garbage.
///
/// Every payload is decode-walked with [`isa::validate`] so a corrupt file
/// is rejected at load time rather than mid-execution.
pub fn read_zbc<R: Read>(reader: &mut R) -> Result<CompiledProgram, ZbcError> {
    let mut program = CompiledProgram::default();
    for i in 0..EVENT_COUNT {
        let mut len_bytes = [0u8; 2];
        reader
            .read_exact(&mut len_bytes)
            .map_err(|e| short_read(e, format!("length of event program {i}")))?;
        let len = u16::from_le_bytes(len_bytes) as usize;

        let mut payload = vec![0u8; len];
        reader
            .read_exact(&mut payload)
            .map_err(|e| short_read(e, format!("{len}-byte payload of event program {i}")))?;
        isa::validate(&payload).map_err(|source| ZbcError::Malformed { event: i, source })?;
        program.events[i] = payload;
    }

    let mut rest = [0u8; 1];
    match reader.read(&mut rest)? {
        0 => Ok(program),
        _ => Err(ZbcError::TrailingBytes),
    }
}

fn short_read(e: io::Error, what: String) -> ZbcError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ZbcError::Truncated(what)
    } else {
        ZbcError::Io(e)
    }
}
