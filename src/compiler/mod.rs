//! Bytecode compilation: opcodes, constant pools, emission and framing.

#[allow(clippy::module_inception)]
pub mod compiler;
pub mod consts;
pub mod decls;
pub mod emitter;
pub mod exprs;
pub mod image;
pub mod opcode;
pub mod stmts;

pub use compiler::Compiler;
pub use consts::ConstTable;
pub use emitter::Emitter;
pub use image::{frame_image, BytecodeImage, SIGNATURE, VERSION};
pub use opcode::{FunctionKindByte, LocalKind, OpCode, Register, REGISTER_COUNT};
