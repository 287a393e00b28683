//! Opcode enumeration, register indices and local-value subtypes.
//!
//! All multi-byte integers in the bytecode are big-endian. Embedded
//! sub-programs (group expressions, call arguments, short-circuit right
//! operands, default parameter values, lazy initializers, function bodies)
//! are length-prefixed with a `u16` and terminated by `EndOfExec` (function
//! bodies by `EndOfFunc`), so the VM can either execute them in place or
//! skip them wholesale.

/// Opcodes for the bytecode virtual machine, assigned densely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Framing ============
    /// Image signature marker, followed by the 4 signature bytes.
    Signature = 0,
    /// Format version marker, followed by the 4 version bytes.
    Version,
    /// Module block start: short string key, `u8` library-entry flag.
    Module,
    /// Module block end.
    EndOfModule,
    /// Constant table block: u16-counted i64 / f64 / string pools.
    ConstTable,

    // ============ Position tracking ============
    /// Source position update: `u16` line, `u16` column.
    LineInfo,

    // ============ Values & registers ============
    /// Load a local value: `u8` subtype (see [`LocalKind`]) + payload.
    Local,
    /// Park the current value in a register: `u8` register index.
    Register,
    /// Assign the value parked in the assign register to a named symbol,
    /// walking up the namespace chain: short string name.
    Assign,
    /// Member read through the postfix-object register: short string key.
    MemberGet,
    /// Member write through the postfix-object register: short string key,
    /// value sub-program.
    MemberSet,
    /// Subscript read: key sub-program.
    SubGet,
    /// Subscript write: key sub-program, value sub-program.
    SubSet,
    /// Invoke the callee in the postfix-object register: `u8` positional
    /// count × sub-program, `u8` named count × (short string + sub-program).
    Call,

    // ============ Stream terminators ============
    /// End of an embedded sub-program; yields the current value.
    EndOfExec,
    /// End of a statement.
    EndOfStmt,
    /// End of a lexical block; releases the block namespace.
    EndOfBlock,
    /// End of a function body; returns the current value.
    EndOfFunc,

    // ============ Control flow ============
    /// Open a lexical block namespace: short string id.
    Block,
    /// Loop bookkeeping: `u16` continue offset, `u16` break offset, both
    /// relative to this opcode's position.
    LoopPoint,
    /// While guard: falls through when the current value is truthy,
    /// otherwise breaks out of the loop.
    WhileStmt,
    /// Do-while guard: jumps back to the loop body when the current value
    /// is truthy, otherwise ends the loop.
    DoStmt,
    /// Conditional: `u16` length of the then-branch. Skips it when the
    /// current value is falsy.
    IfStmt,
    /// Unconditional relative jump: `i16` offset.
    Skip,
    /// Push an anchor for `whenStmt`/`goto` offsets.
    Anchor,
    /// Multi-way branch: `u8` has-subject, `u8` case count, case count ×
    /// `u16` branch offsets, `u16` else offset (0xFFFF = none), `u16` end
    /// offset — all relative to the anchor — followed by the case
    /// sub-programs.
    WhenStmt,
    /// Jump to anchor + `u16` offset, popping the anchor.
    Goto,
    /// Break out of the innermost loop.
    BreakLoop,
    /// Continue the innermost loop.
    ContinueLoop,

    // ============ Declarations ============
    /// Variable declaration: short string id, flag bytes, optional type,
    /// optional eager/lazy initializer.
    VarDecl,
    /// Function declaration: function-definition block.
    FuncDecl,
    /// Class declaration: header + member-declaration stream.
    ClassDecl,
    /// Named struct declaration: id, optional prototype id, fields.
    StructDecl,
    /// Type alias declaration: short string id, type block.
    TypeAliasDecl,
    /// Import binding: short string resolved key, optional alias.
    ImportDecl,

    // ============ Operators ============
    /// Short-circuit or: right-operand sub-program, skipped when the
    /// or-left register is truthy.
    LogicalOr,
    /// Short-circuit and: right-operand sub-program, skipped when the
    /// and-left register is falsy.
    LogicalAnd,
    Equal,
    NotEqual,
    Lesser,
    Greater,
    LesserOrEqual,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// Arithmetic negation of the current value.
    Negative,
    /// Logical negation of the current value.
    LogicalNot,
    /// Cast: relation-left register value to the type in the current value.
    TypeAs,
    /// Type test: relation-left register value against the current value.
    TypeIs,
    /// Negated type test.
    TypeIsNot,
    /// Reify the runtime type of the current value.
    TypeOf,
}

impl OpCode {
    /// Convert from a raw byte.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        if byte <= OpCode::TypeOf as u8 {
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

/// Subtype byte following [`OpCode::Local`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LocalKind {
    Null = 0,
    /// `u8` payload.
    Boolean,
    /// `u16` constant-table index.
    ConstInt,
    /// `u16` constant-table index.
    ConstFloat,
    /// `u16` constant-table index.
    ConstString,
    /// `u16` pattern index, `u8` segment count × sub-program.
    StringInterpolation,
    /// Short string name, resolved through the namespace chain.
    Identifier,
    /// Parenthesized sub-program.
    Group,
    /// `u16` element count × sub-program.
    List,
    /// Struct literal: optional id, optional prototype id, `u8` field
    /// count × (short string key + sub-program).
    Struct,
    /// Function literal: function-definition block.
    Function,
    /// Reified type: type block.
    TypeValue,
}

impl LocalKind {
    pub fn from_u8(byte: u8) -> Option<LocalKind> {
        if byte <= LocalKind::TypeValue as u8 {
            Some(unsafe { std::mem::transmute::<u8, LocalKind>(byte) })
        } else {
            None
        }
    }
}

/// The sixteen named register slots, addressed by index. The VM keeps one
/// 16-slot block per nested expression evaluation. Slots the interpreter
/// tracks natively (loop records, anchors) stay reserved so the indices
/// remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Value = 0,
    Identifier,
    LeftValue,
    RefType,
    TypeArgs,
    LoopCount,
    Anchor,
    Assign,
    OrLeft,
    AndLeft,
    EqualLeft,
    RelationLeft,
    AddLeft,
    MultiplyLeft,
    PostfixObject,
    PostfixKey,
}

/// Number of register slots per block.
pub const REGISTER_COUNT: usize = 16;

impl Register {
    pub fn from_u8(byte: u8) -> Option<Register> {
        if byte < REGISTER_COUNT as u8 {
            Some(unsafe { std::mem::transmute::<u8, Register>(byte) })
        } else {
            None
        }
    }
}

/// Function category byte used inside function-definition blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionKindByte {
    Normal = 0,
    Literal,
    Method,
    Getter,
    Setter,
    Constructor,
    Factory,
}

impl FunctionKindByte {
    pub fn from_u8(byte: u8) -> Option<FunctionKindByte> {
        if byte <= FunctionKindByte::Factory as u8 {
            Some(unsafe { std::mem::transmute::<u8, FunctionKindByte>(byte) })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=OpCode::TypeOf as u8 {
            let op = OpCode::from_u8(byte).expect("valid opcode");
            assert_eq!(byte, op as u8);
        }
        assert!(OpCode::from_u8(255).is_none());
    }

    #[test]
    fn test_local_kind_roundtrip() {
        for byte in 0..=LocalKind::TypeValue as u8 {
            let kind = LocalKind::from_u8(byte).expect("valid local kind");
            assert_eq!(byte, kind as u8);
        }
        assert!(LocalKind::from_u8(200).is_none());
    }

    #[test]
    fn test_register_indices() {
        assert_eq!(Register::Value as u8, 0);
        assert_eq!(Register::PostfixKey as u8, 15);
        assert_eq!(Register::from_u8(14), Some(Register::PostfixObject));
        assert!(Register::from_u8(16).is_none());
    }
}
