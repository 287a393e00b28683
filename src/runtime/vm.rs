//! The bytecode interpreter: a register-augmented stack machine.
//!
//! State: an instruction pointer into the loaded image, a stack of 16-slot
//! register blocks (one per nested expression evaluation), the current
//! namespace, a call stack of frames, loop and anchor records, and the
//! textual stack trace carried by unwinding errors.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::FunctionCategory;
use crate::compiler::{BytecodeImage, FunctionKindByte, LocalKind, OpCode, Register, REGISTER_COUNT};
use crate::error::{ErrorCode, QuillError, VmResult};
use crate::runtime::class::{Class, InstanceField};
use crate::runtime::declaration::{Declaration, LateInit};
use crate::runtime::external::ExternRegistry;
use crate::runtime::function::{
    Function, FunctionBodyKind, ParameterDef, RedirectRecord, RedirectTarget,
};
use crate::runtime::namespace::{Namespace, NamespaceKind};
use crate::runtime::structs::StructObject;
use crate::runtime::value::{TypeValue, Value};
use crate::span::Span;

/// Maximum call depth.
pub(crate) const FRAMES_MAX: usize = 256;

/// What a dispatch step signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal,
    EndOfExec,
    EndOfFunc,
    EndOfModule,
}

/// Loop bookkeeping pushed by `loopPoint`.
pub(crate) struct LoopRecord {
    pub start: usize,
    pub continue_ip: usize,
    pub break_ip: usize,
    pub ns_depth: usize,
    pub anchor_depth: usize,
}

/// One call-stack frame, kept for the stack trace.
pub(crate) struct FrameRecord {
    pub name: String,
    pub module: String,
    pub line: u16,
    pub column: u16,
}

/// The virtual machine. One interpreter instance owns its namespaces,
/// registers and loaded images exclusively; execution is strictly
/// single-threaded.
pub struct Vm {
    pub(crate) image: Rc<BytecodeImage>,
    pub(crate) ip: usize,
    pub(crate) cur_module: String,
    pub(crate) cur_module_is_entry: bool,
    pub(crate) cur_line: u16,
    pub(crate) cur_column: u16,
    pub(crate) cur_value: Value,
    registers: Vec<Value>,
    reg_base: usize,
    pub global: Rc<RefCell<Namespace>>,
    /// The persistent namespace entry scripts evaluate into, so state
    /// survives across `eval` calls on one interpreter.
    pub(crate) script_ns: Rc<RefCell<Namespace>>,
    pub(crate) cur_ns: Rc<RefCell<Namespace>>,
    pub(crate) ns_depth: usize,
    pub(crate) module_namespaces: IndexMap<String, Rc<RefCell<Namespace>>>,
    pub(crate) entry_ns: Option<Rc<RefCell<Namespace>>>,
    pub(crate) loops: Vec<LoopRecord>,
    pub(crate) anchors: Vec<usize>,
    pub(crate) frames: Vec<FrameRecord>,
    pub externs: ExternRegistry,
    pub(crate) class_defs: Vec<Rc<RefCell<Class>>>,
    /// Set while executing a preinclude: module code defines straight into
    /// the global namespace.
    pub(crate) preinclude_mode: bool,
}

impl Vm {
    pub fn new(externs: ExternRegistry) -> Self {
        let global = Namespace::new("global", NamespaceKind::Global);
        let script_ns = Namespace::child(&global, "script", NamespaceKind::Module);
        Self {
            image: Rc::new(BytecodeImage {
                bytes: Vec::new(),
                ints: Vec::new(),
                floats: Vec::new(),
                strings: Vec::new(),
                code_start: 0,
            }),
            ip: 0,
            cur_module: String::new(),
            cur_module_is_entry: false,
            cur_line: 0,
            cur_column: 0,
            cur_value: Value::Null,
            registers: Vec::new(),
            reg_base: 0,
            global: global.clone(),
            script_ns: script_ns.clone(),
            cur_ns: script_ns,
            ns_depth: 0,
            module_namespaces: IndexMap::new(),
            entry_ns: None,
            loops: Vec::new(),
            anchors: Vec::new(),
            frames: Vec::new(),
            externs,
            class_defs: Vec::new(),
            preinclude_mode: false,
        }
    }

    /// Execute every module block of a loaded image in order. Returns the
    /// entry module's final value.
    pub fn execute_image(&mut self, image: Rc<BytecodeImage>) -> VmResult<Value> {
        self.image = image;
        self.ip = self.image.code_start;
        self.push_registers();
        let mut entry_value = Value::Null;

        let result = (|| {
            while self.ip < self.image.bytes.len() {
                let value = self.run_module_block()?;
                if self.cur_module_is_entry {
                    entry_value = value;
                }
            }
            Ok(entry_value)
        })();

        self.pop_registers();
        result.map_err(|e: QuillError| e.in_module(self.cur_module.clone()))
    }

    /// One `module` block: fresh module namespace, statements, `endOfModule`.
    fn run_module_block(&mut self) -> VmResult<Value> {
        self.expect_op(OpCode::Module)?;
        let key = self.read_short_str()?;
        let is_entry = self.read_bool()?;
        self.cur_module = key.clone();
        self.cur_module_is_entry = is_entry;

        let namespace = if self.preinclude_mode {
            self.global.clone()
        } else if is_entry {
            // Entry scripts share one persistent namespace across evals.
            self.script_ns.clone()
        } else {
            Namespace::child(&self.global, key.clone(), NamespaceKind::Module)
        };
        self.module_namespaces.insert(key, namespace.clone());
        if is_entry {
            self.entry_ns = Some(namespace.clone());
        }
        self.cur_ns = namespace;
        self.cur_value = Value::Null;

        loop {
            match self.step()? {
                Flow::EndOfModule => break,
                Flow::Normal | Flow::EndOfExec | Flow::EndOfFunc => {}
            }
        }
        Ok(self.cur_value.clone())
    }

    // ===== Byte cursor =====

    pub(crate) fn err_here(&self, code: ErrorCode, message: impl Into<String>) -> QuillError {
        QuillError::new(
            code,
            message,
            Span::new(0, 0, self.cur_line as usize, self.cur_column as usize),
        )
        .in_module(self.cur_module.clone())
    }

    fn truncated(&self) -> QuillError {
        self.err_here(ErrorCode::UnknownOpCode, "unexpected end of bytecode")
    }

    pub(crate) fn read_u8(&mut self) -> VmResult<u8> {
        let byte = *self
            .image
            .bytes
            .get(self.ip)
            .ok_or_else(|| self.truncated())?;
        self.ip += 1;
        Ok(byte)
    }

    pub(crate) fn read_bool(&mut self) -> VmResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub(crate) fn read_u16(&mut self) -> VmResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_i16(&mut self) -> VmResult<i16> {
        let bytes = self.read_bytes(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_bytes(&mut self, count: usize) -> VmResult<Vec<u8>> {
        if self.ip + count > self.image.bytes.len() {
            return Err(self.truncated());
        }
        let out = self.image.bytes[self.ip..self.ip + count].to_vec();
        self.ip += count;
        Ok(out)
    }

    pub(crate) fn read_short_str(&mut self) -> VmResult<String> {
        let length = self.read_u8()? as usize;
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes)
            .map_err(|_| self.err_here(ErrorCode::UnknownOpCode, "invalid UTF-8 in bytecode"))
    }

    fn expect_op(&mut self, op: OpCode) -> VmResult<()> {
        let byte = self.read_u8()?;
        if byte != op as u8 {
            return Err(self.err_here(
                ErrorCode::UnknownOpCode,
                format!("expected {:?}, found opcode byte {}", op, byte),
            ));
        }
        Ok(())
    }

    // ===== Register file =====

    pub(crate) fn push_registers(&mut self) {
        self.registers
            .extend(std::iter::repeat(Value::Null).take(REGISTER_COUNT));
        self.reg_base = self.registers.len() - REGISTER_COUNT;
    }

    pub(crate) fn pop_registers(&mut self) {
        let new_len = self.registers.len().saturating_sub(REGISTER_COUNT);
        self.registers.truncate(new_len);
        self.reg_base = new_len.saturating_sub(REGISTER_COUNT);
    }

    pub(crate) fn reg(&self, register: Register) -> Value {
        self.registers[self.reg_base + register as usize].clone()
    }

    fn set_reg(&mut self, index: u8, value: Value) {
        self.registers[self.reg_base + index as usize] = value;
    }

    // ===== Sub-program execution =====

    /// Execute a length-prefixed sub-program in place and return its value.
    pub(crate) fn run_sub(&mut self) -> VmResult<Value> {
        let _length = self.read_u16()?;
        self.run_expr_here()
    }

    /// Skip a length-prefixed sub-program, returning the offset of its
    /// first byte.
    pub(crate) fn skip_sub(&mut self) -> VmResult<usize> {
        let length = self.read_u16()? as usize;
        let entry = self.ip;
        if self.ip + length > self.image.bytes.len() {
            return Err(self.truncated());
        }
        self.ip += length;
        Ok(entry)
    }

    /// Run instructions until `endOfExec`, in a fresh register block.
    fn run_expr_here(&mut self) -> VmResult<Value> {
        self.push_registers();
        let result = (|| loop {
            match self.step()? {
                Flow::EndOfExec => return Ok(self.cur_value.clone()),
                Flow::Normal => {}
                other => {
                    return Err(self.err_here(
                        ErrorCode::UnknownOpCode,
                        format!("unexpected {:?} inside expression", other),
                    ))
                }
            }
        })();
        self.pop_registers();
        result
    }

    /// Evaluate the sub-program at `ip` (stored entry offsets: default
    /// values, lazy initializers, redirecting-constructor arguments).
    pub(crate) fn run_expr_at(
        &mut self,
        image: Rc<BytecodeImage>,
        ip: usize,
        namespace: Rc<RefCell<Namespace>>,
    ) -> VmResult<Value> {
        let saved_image = Rc::clone(&self.image);
        let saved_ip = self.ip;
        let saved_ns = self.cur_ns.clone();
        self.image = image;
        self.ip = ip;
        self.cur_ns = namespace;
        let result = self.run_expr_here();
        self.image = saved_image;
        self.ip = saved_ip;
        self.cur_ns = saved_ns;
        result
    }

    /// Run a function body at `ip` until `endOfFunc`.
    pub(crate) fn run_func_at(&mut self, image: Rc<BytecodeImage>, ip: usize) -> VmResult<Value> {
        let saved_image = Rc::clone(&self.image);
        let saved_ip = self.ip;
        self.image = image;
        self.ip = ip;
        self.push_registers();
        let result = (|| loop {
            match self.step()? {
                Flow::EndOfFunc => return Ok(self.cur_value.clone()),
                Flow::Normal => {}
                other => {
                    return Err(self.err_here(
                        ErrorCode::UnknownOpCode,
                        format!("unexpected {:?} inside function body", other),
                    ))
                }
            }
        })();
        self.pop_registers();
        self.image = saved_image;
        self.ip = saved_ip;
        result
    }

    // ===== Namespace helpers =====

    pub(crate) fn push_namespace(&mut self, id: String, kind: NamespaceKind) {
        self.cur_ns = Namespace::child(&self.cur_ns, id, kind);
        self.ns_depth += 1;
    }

    pub(crate) fn pop_namespace(&mut self) -> VmResult<()> {
        let enclosing = self.cur_ns.borrow().enclosing();
        match enclosing {
            Some(parent) => {
                self.cur_ns = parent;
                self.ns_depth -= 1;
                Ok(())
            }
            None => Err(self.err_here(
                ErrorCode::UnknownOpCode,
                "endOfBlock with no enclosing namespace",
            )),
        }
    }

    fn restore_ns_depth(&mut self, target: usize) {
        while self.ns_depth > target {
            let enclosing = self.cur_ns.borrow().enclosing();
            match enclosing {
                Some(parent) => {
                    self.cur_ns = parent;
                    self.ns_depth -= 1;
                }
                None => break,
            }
        }
    }

    /// Define in the current namespace. Redefinition replaces, so scripts
    /// re-evaluated on a persistent interpreter can redeclare.
    pub(crate) fn define_here(&mut self, decl: Declaration) -> VmResult<()> {
        self.cur_ns
            .borrow_mut()
            .define_or_replace(Rc::new(RefCell::new(decl)));
        Ok(())
    }

    /// Read a declaration's value, firing its lazy initializer on first
    /// read.
    pub(crate) fn fetch_decl_value(&mut self, decl: &Rc<RefCell<Declaration>>) -> VmResult<Value> {
        let late = decl.borrow_mut().take_late_init();
        if let Some(late) = late {
            let value = self.run_expr_at(late.image.clone(), late.ip, late.namespace.clone())?;
            decl.borrow_mut().value = value;
        }
        Ok(decl.borrow().value.clone())
    }

    // ===== Dispatch =====

    pub(crate) fn step(&mut self) -> VmResult<Flow> {
        let op_pos = self.ip;
        let byte = self.read_u8()?;
        let op = OpCode::from_u8(byte)
            .ok_or_else(|| self.err_here(ErrorCode::UnknownOpCode, format!("unknown opcode {}", byte)))?;

        match op {
            OpCode::LineInfo => {
                self.cur_line = self.read_u16()?;
                self.cur_column = self.read_u16()?;
            }
            OpCode::Local => self.op_local()?,
            OpCode::Register => {
                let index = self.read_u8()?;
                if index >= REGISTER_COUNT as u8 {
                    return Err(
                        self.err_here(ErrorCode::UnknownOpCode, "register index out of range")
                    );
                }
                let value = self.cur_value.clone();
                self.set_reg(index, value);
            }
            OpCode::Assign => self.op_assign()?,
            OpCode::MemberGet => {
                let key = self.read_short_str()?;
                let receiver = self.reg(Register::PostfixObject);
                self.cur_value = self.member_get(&receiver, &key)?;
            }
            OpCode::MemberSet => {
                let key = self.read_short_str()?;
                let value = self.run_sub()?;
                let receiver = self.reg(Register::PostfixObject);
                self.member_set(&receiver, &key, value.clone())?;
                self.cur_value = value;
            }
            OpCode::SubGet => {
                let key = self.run_sub()?;
                let receiver = self.reg(Register::PostfixObject);
                self.cur_value = self.sub_get(&receiver, &key)?;
            }
            OpCode::SubSet => {
                let key = self.run_sub()?;
                self.set_reg(Register::PostfixKey as u8, key);
                let value = self.run_sub()?;
                let key = self.reg(Register::PostfixKey);
                let receiver = self.reg(Register::PostfixObject);
                self.sub_set(&receiver, &key, value.clone())?;
                self.cur_value = value;
            }
            OpCode::Call => self.op_call()?,
            OpCode::EndOfExec => return Ok(Flow::EndOfExec),
            OpCode::EndOfStmt => {}
            OpCode::EndOfBlock => self.pop_namespace()?,
            OpCode::EndOfFunc => return Ok(Flow::EndOfFunc),
            OpCode::EndOfModule => return Ok(Flow::EndOfModule),
            OpCode::Block => {
                let id = self.read_short_str()?;
                self.push_namespace(id, NamespaceKind::Block);
            }
            OpCode::LoopPoint => {
                let continue_offset = self.read_u16()? as usize;
                let break_offset = self.read_u16()? as usize;
                self.loops.push(LoopRecord {
                    start: op_pos,
                    continue_ip: op_pos + continue_offset,
                    break_ip: op_pos + break_offset,
                    ns_depth: self.ns_depth,
                    anchor_depth: self.anchors.len(),
                });
            }
            OpCode::WhileStmt => {
                if !self.cur_value.is_truthy() {
                    let record = self
                        .loops
                        .pop()
                        .ok_or_else(|| self.err_here(ErrorCode::MisplacedBreak, "no active loop"))?;
                    self.restore_ns_depth(record.ns_depth);
                    self.ip = record.break_ip;
                }
            }
            OpCode::DoStmt => {
                let truthy = self.cur_value.is_truthy();
                let (start, break_ip, ns_depth) = {
                    let record = self.loops.last().ok_or_else(|| {
                        self.err_here(ErrorCode::MisplacedBreak, "no active loop")
                    })?;
                    (record.start, record.break_ip, record.ns_depth)
                };
                if truthy {
                    // Back to the loop body, which starts right after the
                    // loopPoint operands.
                    self.ip = start + 5;
                } else {
                    self.loops.pop();
                    self.restore_ns_depth(ns_depth);
                    self.ip = break_ip;
                }
            }
            OpCode::IfStmt => {
                let then_length = self.read_u16()? as usize;
                if !self.cur_value.is_truthy() {
                    self.ip += then_length;
                }
            }
            OpCode::Skip => {
                let offset = self.read_i16()? as i64;
                self.ip = (self.ip as i64 + offset) as usize;
            }
            OpCode::Anchor => self.anchors.push(op_pos),
            OpCode::WhenStmt => self.op_when()?,
            OpCode::Goto => {
                let offset = self.read_u16()? as usize;
                let anchor = self
                    .anchors
                    .pop()
                    .ok_or_else(|| self.err_here(ErrorCode::UnknownOpCode, "goto without anchor"))?;
                self.ip = anchor + offset;
            }
            OpCode::BreakLoop => {
                let record = self
                    .loops
                    .pop()
                    .ok_or_else(|| self.err_here(ErrorCode::MisplacedBreak, "break outside a loop"))?;
                self.restore_ns_depth(record.ns_depth);
                self.anchors.truncate(record.anchor_depth);
                self.ip = record.break_ip;
            }
            OpCode::ContinueLoop => {
                let (continue_ip, ns_depth, anchor_depth) = {
                    let record = self.loops.last().ok_or_else(|| {
                        self.err_here(ErrorCode::MisplacedContinue, "continue outside a loop")
                    })?;
                    (record.continue_ip, record.ns_depth, record.anchor_depth)
                };
                self.restore_ns_depth(ns_depth);
                self.anchors.truncate(anchor_depth);
                self.ip = continue_ip;
            }
            OpCode::VarDecl => self.op_var_decl()?,
            OpCode::FuncDecl => self.op_func_decl()?,
            OpCode::ClassDecl => self.op_class_decl()?,
            OpCode::StructDecl => self.op_struct_decl()?,
            OpCode::TypeAliasDecl => {
                let id = self.read_short_str()?;
                let ty = self.read_type_value()?;
                self.define_here(Declaration::immutable(id, Value::Type(Rc::new(ty))))?;
            }
            OpCode::ImportDecl => self.op_import_decl()?,
            OpCode::LogicalOr => {
                let length = self.read_u16()? as usize;
                let left = self.reg(Register::OrLeft);
                if left.is_truthy() {
                    self.ip += length;
                    self.cur_value = Value::Bool(true);
                } else {
                    let right = self.run_expr_here()?;
                    self.cur_value = Value::Bool(right.is_truthy());
                }
            }
            OpCode::LogicalAnd => {
                let length = self.read_u16()? as usize;
                let left = self.reg(Register::AndLeft);
                if !left.is_truthy() {
                    self.ip += length;
                    self.cur_value = Value::Bool(false);
                } else {
                    let right = self.run_expr_here()?;
                    self.cur_value = Value::Bool(right.is_truthy());
                }
            }
            OpCode::Equal => {
                let left = self.reg(Register::EqualLeft);
                self.cur_value = Value::Bool(left.equals(&self.cur_value));
            }
            OpCode::NotEqual => {
                let left = self.reg(Register::EqualLeft);
                self.cur_value = Value::Bool(!left.equals(&self.cur_value));
            }
            OpCode::Lesser
            | OpCode::Greater
            | OpCode::LesserOrEqual
            | OpCode::GreaterOrEqual => {
                let left = self.reg(Register::RelationLeft);
                let right = self.cur_value.clone();
                self.cur_value = self.compare(op, &left, &right)?;
            }
            OpCode::Add | OpCode::Subtract => {
                let left = self.reg(Register::AddLeft);
                let right = self.cur_value.clone();
                self.cur_value = self.arithmetic(op, &left, &right)?;
            }
            OpCode::Multiply | OpCode::Divide | OpCode::Modulo => {
                let left = self.reg(Register::MultiplyLeft);
                let right = self.cur_value.clone();
                self.cur_value = self.arithmetic(op, &left, &right)?;
            }
            OpCode::Negative => {
                self.cur_value = match &self.cur_value {
                    Value::Int(n) => Value::Int(n.wrapping_neg()),
                    Value::Float(n) => Value::Float(-n),
                    other => {
                        return Err(self.err_here(
                            ErrorCode::NotA,
                            format!("cannot negate value of type '{}'", other.type_name()),
                        ))
                    }
                };
            }
            OpCode::LogicalNot => {
                self.cur_value = Value::Bool(!self.cur_value.is_truthy());
            }
            OpCode::TypeAs => {
                let value = self.reg(Register::RelationLeft);
                let ty = self.expect_type_value()?;
                self.cur_value = self.cast_value(&value, &ty)?;
            }
            OpCode::TypeIs => {
                let value = self.reg(Register::RelationLeft);
                let ty = self.expect_type_value()?;
                self.cur_value = Value::Bool(self.type_test(&value, &ty));
            }
            OpCode::TypeIsNot => {
                let value = self.reg(Register::RelationLeft);
                let ty = self.expect_type_value()?;
                self.cur_value = Value::Bool(!self.type_test(&value, &ty));
            }
            OpCode::TypeOf => {
                self.cur_value =
                    Value::Type(Rc::new(TypeValue::nominal(self.cur_value.type_name())));
            }
            OpCode::Signature | OpCode::Version | OpCode::ConstTable | OpCode::Module => {
                return Err(self.err_here(
                    ErrorCode::UnknownOpCode,
                    format!("{:?} opcode inside a statement stream", op),
                ))
            }
        }
        Ok(Flow::Normal)
    }

    // ===== Value loading =====

    fn op_local(&mut self) -> VmResult<()> {
        let byte = self.read_u8()?;
        let kind = LocalKind::from_u8(byte).ok_or_else(|| {
            self.err_here(ErrorCode::UnknownOpCode, format!("unknown local kind {}", byte))
        })?;

        self.cur_value = match kind {
            LocalKind::Null => Value::Null,
            LocalKind::Boolean => Value::Bool(self.read_bool()?),
            LocalKind::ConstInt => {
                let index = self.read_u16()? as usize;
                Value::Int(*self.image.ints.get(index).ok_or_else(|| {
                    self.err_here(ErrorCode::UnknownOpCode, "int constant index out of range")
                })?)
            }
            LocalKind::ConstFloat => {
                let index = self.read_u16()? as usize;
                Value::Float(*self.image.floats.get(index).ok_or_else(|| {
                    self.err_here(ErrorCode::UnknownOpCode, "float constant index out of range")
                })?)
            }
            LocalKind::ConstString => {
                let index = self.read_u16()? as usize;
                Value::Str(
                    self.image
                        .strings
                        .get(index)
                        .ok_or_else(|| {
                            self.err_here(
                                ErrorCode::UnknownOpCode,
                                "string constant index out of range",
                            )
                        })?
                        .clone(),
                )
            }
            LocalKind::StringInterpolation => {
                let index = self.read_u16()? as usize;
                let pattern = self
                    .image
                    .strings
                    .get(index)
                    .ok_or_else(|| {
                        self.err_here(ErrorCode::UnknownOpCode, "pattern index out of range")
                    })?
                    .clone();
                let count = self.read_u8()? as usize;
                let mut rendered = pattern;
                for segment in 0..count {
                    let value = self.run_sub()?;
                    rendered =
                        rendered.replace(&format!("{{{}}}", segment), &self.display_value(&value)?);
                }
                Value::Str(rendered)
            }
            LocalKind::Identifier => {
                let name = self.read_short_str()?;
                let decl = self.cur_ns.borrow().lookup(&name);
                match decl {
                    Some(decl) => self.fetch_decl_value(&decl)?,
                    None => return Err(self.err_here(
                        ErrorCode::Undefined,
                        format!("undefined symbol '{}'", name),
                    )),
                }
            }
            LocalKind::Group => self.run_sub()?,
            LocalKind::List => {
                let count = self.read_u16()? as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.run_sub()?);
                }
                Value::list(items)
            }
            LocalKind::Struct => self.op_struct_literal()?,
            LocalKind::Function => {
                let parts = self.read_function_def()?;
                let function = self.build_function(parts, Some(self.cur_ns.clone()))?;
                Value::Function(Rc::new(function))
            }
            LocalKind::TypeValue => Value::Type(Rc::new(self.read_type_value()?)),
        };
        Ok(())
    }

    fn op_struct_literal(&mut self) -> VmResult<Value> {
        let id = if self.read_bool()? {
            Some(self.read_short_str()?)
        } else {
            None
        };
        let prototype = if self.read_bool()? {
            let name = self.read_short_str()?;
            Some(self.lookup_struct(&name)?)
        } else {
            None
        };
        let count = self.read_u8()? as usize;
        let object = Rc::new(RefCell::new(StructObject::new(id, prototype)));
        for _ in 0..count {
            let key = self.read_short_str()?;
            let value = self.run_sub()?;
            object.borrow_mut().set(key, value);
        }
        Ok(Value::Struct(object))
    }

    pub(crate) fn lookup_struct(&mut self, name: &str) -> VmResult<Rc<RefCell<StructObject>>> {
        let decl = self
            .cur_ns
            .borrow()
            .lookup(name)
            .ok_or_else(|| self.err_here(ErrorCode::Undefined, format!("undefined symbol '{}'", name)))?;
        match self.fetch_decl_value(&decl)? {
            Value::Struct(object) => Ok(object),
            other => Err(self.err_here(
                ErrorCode::NotA,
                format!("'{}' is not a struct (found {})", name, other.type_name()),
            )),
        }
    }

    fn op_assign(&mut self) -> VmResult<()> {
        let name = self.read_short_str()?;
        let value = self.reg(Register::Assign);
        let decl = self
            .cur_ns
            .borrow()
            .lookup(&name)
            .ok_or_else(|| self.err_here(ErrorCode::Undefined, format!("undefined symbol '{}'", name)))?;
        {
            let borrowed = decl.borrow();
            if !borrowed.is_mutable {
                return Err(self.err_here(
                    ErrorCode::Immutable,
                    format!("cannot assign to immutable '{}'", name),
                ));
            }
        }
        let mut borrowed = decl.borrow_mut();
        borrowed.value = value.clone();
        // An assignment supersedes any pending lazy initializer.
        borrowed.late_init = None;
        drop(borrowed);
        self.cur_value = value;
        Ok(())
    }

    fn op_when(&mut self) -> VmResult<()> {
        let has_subject = self.read_bool()?;
        let case_count = self.read_u8()? as usize;
        let mut branch_offsets = Vec::with_capacity(case_count);
        for _ in 0..case_count {
            branch_offsets.push(self.read_u16()? as usize);
        }
        let else_offset = self.read_u16()?;
        let end_offset = self.read_u16()? as usize;

        let anchor = *self
            .anchors
            .last()
            .ok_or_else(|| self.err_here(ErrorCode::UnknownOpCode, "whenStmt without anchor"))?;
        let subject = if has_subject {
            Some(self.reg(Register::Value))
        } else {
            None
        };

        for branch_offset in &branch_offsets {
            let candidate = self.run_sub()?;
            let matched = match &subject {
                Some(subject) => candidate.equals(subject),
                None => candidate.is_truthy(),
            };
            if matched {
                self.ip = anchor + branch_offset;
                return Ok(());
            }
        }

        if else_offset != u16::MAX {
            self.ip = anchor + else_offset as usize;
        } else {
            // Nothing matched and there is no else: the branch goto will
            // never run, so release the anchor here.
            self.anchors.pop();
            self.ip = anchor + end_offset;
        }
        Ok(())
    }

    // ===== Declarations =====

    fn op_var_decl(&mut self) -> VmResult<()> {
        let id = self.read_short_str()?;
        let is_member = self.read_bool()?;
        let is_static = self.read_bool()?;
        let is_mutable = self.read_bool()?;
        let is_external = self.read_bool()?;
        let declared_type = if self.read_bool()? {
            Some(self.read_type_value()?)
        } else {
            None
        };
        let init_kind = self.read_u8()?;

        if is_member {
            // An instance field template: record the initializer offset on
            // the class being defined and skip it.
            let init_ip = match init_kind {
                0 => None,
                1 => Some(self.skip_sub()?),
                2 => {
                    let _line = self.read_u16()?;
                    let _column = self.read_u16()?;
                    Some(self.skip_sub()?)
                }
                other => {
                    return Err(self.err_here(
                        ErrorCode::UnknownOpCode,
                        format!("unknown initializer kind {}", other),
                    ))
                }
            };
            let class = self.class_defs.last().cloned().ok_or_else(|| {
                self.err_here(ErrorCode::UnknownOpCode, "member declaration outside a class")
            })?;
            class.borrow_mut().instance_fields.push(InstanceField {
                id,
                is_mutable,
                declared_type,
                init_ip,
                image: init_ip.is_some().then(|| Rc::clone(&self.image)),
            });
            return Ok(());
        }

        let mut decl = Declaration {
            id: id.clone(),
            class_id: self.class_defs.last().map(|c| c.borrow().id.clone()),
            value: Value::Null,
            declared_type,
            is_mutable,
            is_external,
            is_static,
            is_const: !is_mutable,
            is_top_level: self.ns_depth == 0,
            late_init: None,
        };

        match init_kind {
            0 => {}
            1 => {
                decl.value = self.run_sub()?;
            }
            2 => {
                let line = self.read_u16()?;
                let column = self.read_u16()?;
                let entry = self.skip_sub()?;
                decl.late_init = Some(LateInit {
                    image: Rc::clone(&self.image),
                    ip: entry,
                    line,
                    column,
                    namespace: self.cur_ns.clone(),
                });
            }
            other => {
                return Err(self.err_here(
                    ErrorCode::UnknownOpCode,
                    format!("unknown initializer kind {}", other),
                ))
            }
        }

        self.define_here(decl)
    }

    fn op_func_decl(&mut self) -> VmResult<()> {
        let parts = self.read_function_def()?;

        if parts.is_member {
            let class = self.class_defs.last().cloned().ok_or_else(|| {
                self.err_here(ErrorCode::UnknownOpCode, "method declaration outside a class")
            })?;
            let function = self.build_function(parts, None)?;
            class.borrow_mut().instance_methods.push(Rc::new(function));
            return Ok(());
        }

        let closure = self.cur_ns.clone();
        let internal_name = match parts.category {
            FunctionCategory::Constructor => Function::construct_name(
                (!parts.id.is_empty()).then_some(parts.id.as_str()),
            ),
            FunctionCategory::Factory => Function::construct_name(
                (!parts.id.is_empty()).then_some(parts.id.as_str()),
            ),
            FunctionCategory::Getter => Function::getter_name(&parts.id),
            FunctionCategory::Setter => Function::setter_name(&parts.id),
            _ => parts.id.clone(),
        };

        let function = self.build_function(parts, Some(closure))?;
        self.define_here(Declaration::immutable(
            internal_name,
            Value::Function(Rc::new(function)),
        ))
    }

    fn op_class_decl(&mut self) -> VmResult<()> {
        let id = self.read_short_str()?;
        let generic_count = self.read_u8()? as usize;
        let mut generic_params = Vec::with_capacity(generic_count);
        for _ in 0..generic_count {
            generic_params.push(self.read_short_str()?);
        }
        let is_external = self.read_bool()?;
        let is_abstract = self.read_bool()?;
        let is_enum = self.read_bool()?;
        let super_type = if self.read_bool()? {
            Some(self.read_type_value()?)
        } else {
            None
        };
        let implements_count = self.read_u8()? as usize;
        let mut implements = Vec::with_capacity(implements_count);
        for _ in 0..implements_count {
            implements.push(self.read_type_value()?);
        }
        let mixes_count = self.read_u8()? as usize;
        let mut mixes = Vec::with_capacity(mixes_count);
        for _ in 0..mixes_count {
            mixes.push(self.read_type_value()?);
        }
        let has_user_ctor = self.read_bool()?;

        // Link the superclass now: the declaration must already be in
        // scope.
        let super_class = match &super_type {
            Some(ty) => {
                let super_id = ty.nominal_id().ok_or_else(|| {
                    self.err_here(ErrorCode::NotA, "superclass type must be nominal")
                })?;
                let decl = self.cur_ns.borrow().lookup(super_id).ok_or_else(|| {
                    self.err_here(
                        ErrorCode::Undefined,
                        format!("undefined superclass '{}'", super_id),
                    )
                })?;
                match self.fetch_decl_value(&decl)? {
                    Value::Class(class) => Some(class),
                    other => {
                        return Err(self.err_here(
                            ErrorCode::NotA,
                            format!("'{}' is not a class (found {})", super_id, other.type_name()),
                        ))
                    }
                }
            }
            None => None,
        };

        let namespace = Namespace::child(
            &self.cur_ns,
            id.clone(),
            NamespaceKind::Class {
                class_id: id.clone(),
            },
        );
        let class = Rc::new(RefCell::new(Class {
            id: id.clone(),
            super_type,
            super_class,
            generic_params,
            implements,
            mixes,
            is_external,
            is_abstract,
            is_enum,
            has_user_ctor,
            namespace: namespace.clone(),
            instance_fields: Vec::new(),
            instance_methods: Vec::new(),
        }));

        // Execute the member-declaration stream in the class namespace.
        let _body_length = self.read_u16()?;
        let saved_ns = self.cur_ns.clone();
        self.cur_ns = namespace;
        self.class_defs.push(class.clone());
        let result = (|| loop {
            match self.step()? {
                Flow::EndOfExec => return Ok(()),
                Flow::Normal => {}
                other => {
                    return Err(self.err_here(
                        ErrorCode::UnknownOpCode,
                        format!("unexpected {:?} inside class body", other),
                    ))
                }
            }
        })();
        self.class_defs.pop();
        self.cur_ns = saved_ns;
        result?;

        self.define_here(Declaration::immutable(id, Value::Class(class)))
    }

    fn op_struct_decl(&mut self) -> VmResult<()> {
        let id = self.read_short_str()?;
        let prototype = if self.read_bool()? {
            let name = self.read_short_str()?;
            Some(self.lookup_struct(&name)?)
        } else {
            None
        };
        let count = self.read_u8()? as usize;
        let object = Rc::new(RefCell::new(StructObject::new(Some(id.clone()), prototype)));
        for _ in 0..count {
            let key = self.read_short_str()?;
            let value = self.run_sub()?;
            object.borrow_mut().set(key, value);
        }
        self.define_here(Declaration::immutable(id, Value::Struct(object)))
    }

    fn op_import_decl(&mut self) -> VmResult<()> {
        let key = self.read_short_str()?;
        let alias = if self.read_bool()? {
            Some(self.read_short_str()?)
        } else {
            None
        };

        let namespace = self
            .module_namespaces
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                self.err_here(
                    ErrorCode::SourceProviderError,
                    format!("imported module '{}' was not loaded", key),
                )
            })?;

        match alias {
            Some(alias) => {
                // Alias imports bind a struct object snapshotting the
                // module's public top-level declarations.
                let object = Rc::new(RefCell::new(StructObject::new(Some(alias.clone()), None)));
                let decls: Vec<_> = namespace
                    .borrow()
                    .declarations()
                    .map(|(name, decl)| (name.clone(), decl.clone()))
                    .collect();
                for (name, decl) in decls {
                    if name.starts_with('_') || name.starts_with('$') {
                        continue;
                    }
                    let value = self.fetch_decl_value(&decl)?;
                    object.borrow_mut().set(name, value);
                }
                self.define_here(Declaration::immutable(alias, Value::Struct(object)))?;
            }
            None => {
                let decls: Vec<_> = namespace
                    .borrow()
                    .declarations()
                    .map(|(name, decl)| (name.clone(), decl.clone()))
                    .collect();
                for (name, decl) in decls {
                    if name.starts_with('_') || name.starts_with('$') {
                        continue;
                    }
                    // Shared declaration: assignments in either module stay
                    // visible in both.
                    self.cur_ns.borrow_mut().define_or_replace(decl);
                }
            }
        }
        Ok(())
    }

    // ===== Function definitions =====

    pub(crate) fn read_function_def(&mut self) -> VmResult<FunctionDefParts> {
        let id = self.read_short_str()?;
        let category_byte = self.read_u8()?;
        let category = match FunctionKindByte::from_u8(category_byte) {
            Some(FunctionKindByte::Normal) => FunctionCategory::Normal,
            Some(FunctionKindByte::Literal) => FunctionCategory::Literal,
            Some(FunctionKindByte::Method) => FunctionCategory::Method,
            Some(FunctionKindByte::Getter) => FunctionCategory::Getter,
            Some(FunctionKindByte::Setter) => FunctionCategory::Setter,
            Some(FunctionKindByte::Constructor) => FunctionCategory::Constructor,
            Some(FunctionKindByte::Factory) => FunctionCategory::Factory,
            None => {
                return Err(self.err_here(
                    ErrorCode::UnknownOpCode,
                    format!("unknown function category {}", category_byte),
                ))
            }
        };
        let is_external = self.read_bool()?;
        let is_static = self.read_bool()?;
        let is_member = self.read_bool()?;
        let is_variadic = self.read_bool()?;
        let min_arity = self.read_u8()? as usize;
        let max_arity = self.read_u8()? as usize;

        let param_count = self.read_u8()? as usize;
        let mut params = IndexMap::with_capacity(param_count);
        for _ in 0..param_count {
            let param_id = self.read_short_str()?;
            let is_optional = self.read_bool()?;
            let is_named = self.read_bool()?;
            let param_variadic = self.read_bool()?;
            let declared_type = if self.read_bool()? {
                Some(self.read_type_value()?)
            } else {
                None
            };
            let default_ip = if self.read_bool()? {
                Some(self.skip_sub()?)
            } else {
                None
            };
            params.insert(
                param_id.clone(),
                Rc::new(ParameterDef {
                    id: param_id,
                    declared_type,
                    default_ip,
                    is_optional,
                    is_named,
                    is_variadic: param_variadic,
                }),
            );
        }

        let declared_return_type = if self.read_bool()? {
            Some(self.read_type_value()?)
        } else {
            None
        };

        let redirect = if self.read_bool()? {
            let target = if self.read_u8()? == 0 {
                RedirectTarget::Super
            } else {
                RedirectTarget::This
            };
            let key = if self.read_bool()? {
                Some(self.read_short_str()?)
            } else {
                None
            };
            let positional_count = self.read_u8()? as usize;
            let mut positional_ips = Vec::with_capacity(positional_count);
            for _ in 0..positional_count {
                positional_ips.push(self.skip_sub()?);
            }
            let named_count = self.read_u8()? as usize;
            let mut named_ips = Vec::with_capacity(named_count);
            for _ in 0..named_count {
                let name = self.read_short_str()?;
                named_ips.push((name, self.skip_sub()?));
            }
            Some(RedirectRecord {
                target,
                key,
                positional_ips,
                named_ips,
            })
        } else {
            None
        };

        let body_entry = if self.read_bool()? {
            Some(self.skip_sub()?)
        } else {
            None
        };

        Ok(FunctionDefParts {
            id,
            category,
            is_external,
            is_static,
            is_member,
            is_variadic,
            min_arity,
            max_arity,
            params,
            declared_return_type,
            redirect,
            body_entry,
            line: self.cur_line,
            column: self.cur_column,
        })
    }

    /// Turn a decoded definition into a function value. External functions
    /// bind to the host registry; everything else gets a bytecode entry.
    pub(crate) fn build_function(
        &mut self,
        parts: FunctionDefParts,
        closure: Option<Rc<RefCell<Namespace>>>,
    ) -> VmResult<Function> {
        let class_id = self.class_defs.last().map(|c| c.borrow().id.clone());
        let owning_class = self.class_defs.last().map(Rc::downgrade);

        let body = if parts.is_external {
            let lookup_id = match &class_id {
                Some(class_id) => format!("{}.{}", class_id, parts.id),
                None => parts.id.clone(),
            };
            let callable = self
                .externs
                .fetch_function(&lookup_id)
                .or_else(|| self.externs.fetch_function(&parts.id))
                .ok_or_else(|| {
                    self.err_here(
                        ErrorCode::UndefinedExternal,
                        format!("no external function registered as '{}'", lookup_id),
                    )
                })?;
            FunctionBodyKind::Extern(callable)
        } else {
            match parts.body_entry {
                Some(entry) => FunctionBodyKind::Bytecode {
                    image: Rc::clone(&self.image),
                    module: self.cur_module.clone(),
                    entry,
                    line: parts.line,
                    column: parts.column,
                },
                None => FunctionBodyKind::None,
            }
        };

        let internal_name = match parts.category {
            FunctionCategory::Constructor | FunctionCategory::Factory => {
                let key = (!parts.id.is_empty()).then_some(parts.id.as_str());
                match &class_id {
                    Some(class_id) => format!("{}.{}", class_id, Function::construct_name(key)),
                    None => Function::construct_name(key),
                }
            }
            FunctionCategory::Literal if parts.id.is_empty() => "$anonymous".to_string(),
            _ => parts.id.clone(),
        };

        Ok(Function {
            internal_name,
            id: (!parts.id.is_empty()).then(|| parts.id.clone()),
            category: parts.category,
            class_id,
            owning_class,
            is_external: parts.is_external,
            is_static: parts.is_static,
            is_variadic: parts.is_variadic,
            min_arity: parts.min_arity,
            max_arity: parts.max_arity,
            params: parts.params,
            declared_return_type: parts.declared_return_type,
            closure,
            redirect: parts.redirect,
            body,
            external_type_id: None,
            bound_receiver: None,
        })
    }

    // ===== Types =====

    pub(crate) fn read_type_value(&mut self) -> VmResult<TypeValue> {
        let kind = self.read_u8()?;
        match kind {
            0 => {
                let id = self.read_short_str()?;
                let nullable = self.read_bool()?;
                let count = self.read_u8()? as usize;
                let mut args = Vec::with_capacity(count);
                for _ in 0..count {
                    args.push(self.read_type_value()?);
                }
                if id == "any" && args.is_empty() && !nullable {
                    Ok(TypeValue::Any)
                } else {
                    Ok(TypeValue::Nominal { id, args, nullable })
                }
            }
            1 => {
                let count = self.read_u8()? as usize;
                let mut params = Vec::with_capacity(count);
                for _ in 0..count {
                    let variadic = self.read_bool()?;
                    params.push((variadic, self.read_type_value()?));
                }
                let return_type = if self.read_bool()? {
                    Some(Box::new(self.read_type_value()?))
                } else {
                    None
                };
                Ok(TypeValue::Function {
                    params,
                    return_type,
                })
            }
            2 => Ok(TypeValue::Generic(self.read_short_str()?)),
            other => Err(self.err_here(
                ErrorCode::UnknownOpCode,
                format!("unknown type expression kind {}", other),
            )),
        }
    }

    fn expect_type_value(&mut self) -> VmResult<Rc<TypeValue>> {
        match &self.cur_value {
            Value::Type(ty) => Ok(ty.clone()),
            other => Err(self.err_here(
                ErrorCode::NotA,
                format!("expected a type, found '{}'", other.type_name()),
            )),
        }
    }

    /// `value is ty`, also consulting type-alias declarations in scope.
    pub(crate) fn type_test(&self, value: &Value, ty: &TypeValue) -> bool {
        match ty {
            TypeValue::Any | TypeValue::Generic(_) => true,
            TypeValue::Function { .. } => matches!(value, Value::Function(_)),
            TypeValue::Nominal { id, nullable, .. } => {
                if matches!(value, Value::Null) {
                    return *nullable || id == "null";
                }
                match (id.as_str(), value) {
                    ("any", _) => true,
                    ("num", Value::Int(_) | Value::Float(_)) => true,
                    ("int", Value::Int(_)) => true,
                    ("float", Value::Float(_)) => true,
                    ("bool", Value::Bool(_)) => true,
                    ("str", Value::Str(_)) => true,
                    ("List", Value::List(_)) => true,
                    ("struct", Value::Struct(_)) => true,
                    ("fun" | "function", Value::Function(_)) => true,
                    ("type", Value::Type(_)) => true,
                    (id, Value::Instance(instance)) => instance.is_kind_of(id),
                    (id, Value::Class(class)) => class.borrow().is_kind_of(id),
                    (id, Value::Struct(object)) => struct_is_kind_of(object, id),
                    (id, Value::ExternObject(object)) => object.type_id == id,
                    _ => {
                        // A type alias in scope may widen the test.
                        if let Some(decl) = self.cur_ns.borrow().lookup(id) {
                            if let Value::Type(aliased) = &decl.borrow().value {
                                return self.type_test(value, aliased);
                            }
                        }
                        false
                    }
                }
            }
        }
    }

    fn cast_value(&self, value: &Value, ty: &TypeValue) -> VmResult<Value> {
        // Numeric conversions are the only representation changes `as`
        // performs; everything else is a checked identity.
        if let TypeValue::Nominal { id, .. } = ty {
            match (id.as_str(), value) {
                ("float" | "num", Value::Int(n)) => return Ok(Value::Float(*n as f64)),
                ("int", Value::Float(n)) => return Ok(Value::Int(*n as i64)),
                ("str", Value::Str(_)) => return Ok(value.clone()),
                _ => {}
            }
        }
        if self.type_test(value, ty) {
            Ok(value.clone())
        } else {
            Err(self
                .err_here(
                    ErrorCode::TypeCast,
                    format!(
                        "cannot cast value of type '{}' to '{}'",
                        value.type_name(),
                        ty
                    ),
                ))
        }
    }

    // ===== Arithmetic & comparison =====

    fn arithmetic(&self, op: OpCode, left: &Value, right: &Value) -> VmResult<Value> {
        use OpCode::*;
        let result = match (op, left, right) {
            (Add, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
            (Subtract, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(*b)),
            (Multiply, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_mul(*b)),
            (Modulo, Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(self.err_here(ErrorCode::OutOfRange, "modulo by zero"));
                }
                Value::Int(a.wrapping_rem(*b))
            }
            // Division always yields a float, like the other numeric
            // tower operations on mixed operands.
            (Divide, Value::Int(a), Value::Int(b)) => Value::Float(*a as f64 / *b as f64),
            (Add, Value::Str(a), Value::Str(b)) => Value::Str(format!("{}{}", a, b)),
            (Add, Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Value::list(items)
            }
            (op, a, b) => {
                let (a, b) = match (as_float(a), as_float(b)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(self.err_here(
                            ErrorCode::NotA,
                            format!(
                                "operator not defined for '{}' and '{}'",
                                left.type_name(),
                                right.type_name()
                            ),
                        ))
                    }
                };
                match op {
                    Add => Value::Float(a + b),
                    Subtract => Value::Float(a - b),
                    Multiply => Value::Float(a * b),
                    Divide => Value::Float(a / b),
                    Modulo => Value::Float(a % b),
                    _ => unreachable!("arithmetic dispatch"),
                }
            }
        };
        Ok(result)
    }

    fn compare(&self, op: OpCode, left: &Value, right: &Value) -> VmResult<Value> {
        let ordering = match (left, right) {
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (a, b) => match (as_float(a), as_float(b)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => {
                    return Err(self.err_here(
                        ErrorCode::NotA,
                        format!(
                            "values of type '{}' and '{}' are not comparable",
                            left.type_name(),
                            right.type_name()
                        ),
                    ))
                }
            },
        };
        let Some(ordering) = ordering else {
            return Ok(Value::Bool(false));
        };
        let result = match op {
            OpCode::Lesser => ordering.is_lt(),
            OpCode::Greater => ordering.is_gt(),
            OpCode::LesserOrEqual => ordering.is_le(),
            OpCode::GreaterOrEqual => ordering.is_ge(),
            _ => unreachable!("comparison dispatch"),
        };
        Ok(Value::Bool(result))
    }
}

/// Decoded function-definition block.
pub(crate) struct FunctionDefParts {
    pub id: String,
    pub category: FunctionCategory,
    pub is_external: bool,
    pub is_static: bool,
    pub is_member: bool,
    pub is_variadic: bool,
    pub min_arity: usize,
    pub max_arity: usize,
    pub params: IndexMap<String, Rc<ParameterDef>>,
    pub declared_return_type: Option<TypeValue>,
    pub redirect: Option<RedirectRecord>,
    pub body_entry: Option<usize>,
    pub line: u16,
    pub column: u16,
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}

fn struct_is_kind_of(object: &Rc<RefCell<StructObject>>, id: &str) -> bool {
    let borrowed = object.borrow();
    if borrowed.id.as_deref() == Some(id) {
        return true;
    }
    match &borrowed.prototype {
        Some(prototype) => struct_is_kind_of(prototype, id),
        None => false,
    }
}
