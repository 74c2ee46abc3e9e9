//! TPF → SPIR-V compiler (C7): consumes an externally-decoded instruction
//! stream and lowers it through the SPIR-V builder (C6).
pub mod instr;
mod lower;
mod symtab;

pub use instr::{DeclPayload, Immediate, Instruction, InterpolationMode, Opcode, Operand, Register, RegisterType};
pub use lower::Compiler;
