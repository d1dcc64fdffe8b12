//! Human-readable bytecode listings.
//!
//! One instruction per line: code offset, mnemonic, operands. With a source
//! manager attached, the listing echoes the source line each time the line
//! table entry changes, which is the same resolution the VM uses for
//! breakpoints and line stepping.

use std::fmt::Write;

use nano_core::{LineInfo, Opcode, Program, SourceManager};

/// A single decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: Opcode,
    pub operands: [i32; 2],
}

/// Decode the instruction at `offset`, returning it and the next offset.
pub fn decode(program: &Program, offset: u32) -> Option<(Instruction, u32)> {
    let code = &program.code;
    let byte = *code.get(offset as usize)?;
    let opcode = Opcode::try_from(byte).ok()?;

    let mut operands = [0i32; 2];
    let mut pos = offset as usize + 1;
    for slot in operands.iter_mut().take(opcode.num_operands()) {
        let bytes: [u8; 4] = code.get(pos..pos + 4)?.try_into().ok()?;
        *slot = i32::from_le_bytes(bytes);
        pos += 4;
    }

    Some((
        Instruction {
            offset,
            opcode,
            operands,
        },
        pos as u32,
    ))
}

pub struct Disassembler<'a> {
    program: &'a Program,
    sources: Option<&'a SourceManager>,
}

impl<'a> Disassembler<'a> {
    pub fn new(program: &'a Program) -> Self {
        Disassembler {
            program,
            sources: None,
        }
    }

    pub fn with_sources(program: &'a Program, sources: &'a SourceManager) -> Self {
        Disassembler {
            program,
            sources: Some(sources),
        }
    }

    /// Render one instruction.
    pub fn format_instruction(&self, ins: &Instruction) -> String {
        let mnemonic = ins.opcode.mnemonic();
        match ins.opcode.num_operands() {
            0 => mnemonic.to_string(),
            1 => match ins.opcode {
                // the operand is a float bit pattern
                Opcode::NewFlt => {
                    format!("{:<12} {}", mnemonic, f32::from_bits(ins.operands[0] as u32))
                }
                _ => format!("{:<12} {}", mnemonic, ins.operands[0]),
            },
            _ => format!("{:<12} {} {}", mnemonic, ins.operands[0], ins.operands[1]),
        }
    }

    /// Disassemble the whole program into a listing.
    pub fn disasm(&self) -> String {
        let mut out = String::new();
        let mut last_line = LineInfo::INVALID;
        let mut offset = 0u32;

        while (offset as usize) < self.program.code.len() {
            // announce function entry points
            if let Some(func) = self
                .program
                .functions
                .iter()
                .find(|f| f.code_start == offset && f.code_end > f.code_start)
            {
                let _ = writeln!(out, "{}:", func.name);
            }

            let line = self.program.get_line(offset);
            if line != last_line {
                last_line = line;
                if let Some(text) = self.sources.and_then(|s| s.get_line(line)) {
                    let _ = writeln!(out, "  -- {:>3}  {}", line.line, text.trim_end());
                }
            }

            let Some((ins, next)) = decode(self.program, offset) else {
                let _ = writeln!(out, "{:04} <bad opcode {}>", offset, self.program.code[offset as usize]);
                break;
            };
            let _ = writeln!(out, "{:04} {}", offset, self.format_instruction(&ins));
            offset = next;
        }
        out
    }
}
