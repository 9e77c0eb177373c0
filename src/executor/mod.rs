mod ops;

use std::io::{BufRead, Write};

use log::{debug, trace, warn};

use crate::error::Error;
use crate::memory::ProcessMemory;
use crate::program::{ArgType, Argument, Instruction, OpCode, Program};
use crate::stack::{CallStack, DataStack};
use crate::value::{DataType, Value};

/// Dispatches a [`Program`] to completion, owning the three memory frames, the data
/// and call stacks, and the program counter. Reads `READ` operands from `input` and
/// writes `WRITE` output to `output`; `DPRINT`/`BREAK` always go to process stderr.
pub struct Executor<R: BufRead, W: Write> {
    program: Program,
    pc: usize,
    memory: ProcessMemory,
    data_stack: DataStack,
    call_stack: CallStack,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Executor<R, W> {
    pub fn new(program: Program, input: R, output: W) -> Executor<R, W> {
        Executor {
            program,
            pc: 0,
            memory: ProcessMemory::new(),
            data_stack: DataStack::new(),
            call_stack: CallStack::new(),
            input,
            output,
        }
    }

    /// Runs until the program counter runs off the end of the program (exit code 0)
    /// or an `EXIT` instruction halts it (its own exit code). Any instruction error
    /// aborts the run.
    pub fn run(&mut self) -> Result<i32, Error> {
        loop {
            let instruction = match self.program.instruction_at(self.pc) {
                Some(instruction) => instruction.clone(),
                None => return Ok(0),
            };

            trace!("pc={} opcode={:?}", self.pc, instruction.op_code());
            instruction.check_arg_types()?;

            if let Some(code) = self.execute(&instruction)? {
                return Ok(code);
            }
        }
    }

    /// Resolves a value-bearing argument, checking a `var` operand's runtime type
    /// against `accepted` (a literal's type was already checked by
    /// [`Instruction::check_arg_types`]).
    fn resolve_value(&self, arg: &Argument, accepted: &[DataType]) -> Result<Value, Error> {
        if arg.arg_type() == ArgType::Var {
            let variable = self.memory.get(arg.var_name()?)?;
            let value = variable.value()?.clone();
            if !accepted.contains(&value.val_type()) {
                return Err(Error::BadOperandType(format!(
                    "expected one of {:?}, variable holds {:?}",
                    accepted,
                    value.val_type()
                )));
            }
            Ok(value)
        } else {
            arg.literal_value()
        }
    }

    fn set_dest(&mut self, arg: &Argument, value: Value) -> Result<(), Error> {
        self.memory.get_mut(arg.var_name()?)?.set_value(value);
        Ok(())
    }

    /// Runs one instruction. Returns `Some(code)` if it was `EXIT`, advancing nothing
    /// further; otherwise advances the program counter (jumps and calls set it
    /// directly and skip the default +1).
    fn execute(&mut self, instruction: &Instruction) -> Result<Option<i32>, Error> {
        use OpCode::*;

        let args = instruction.args();
        let jumped = match instruction.op_code() {
            CreateFrame => {
                self.memory.create_frame();
                debug!("CREATEFRAME");
                false
            }
            PushFrame => {
                self.memory.push_frame()?;
                debug!("PUSHFRAME depth={}", self.memory.local_frame_depth());
                false
            }
            PopFrame => {
                self.memory.pop_frame()?;
                debug!("POPFRAME depth={}", self.memory.local_frame_depth());
                false
            }
            DefVar => {
                self.memory.define(args[0].var_name()?)?;
                false
            }
            Move => {
                let value = self.resolve_value(&args[1], ALL_TYPES)?;
                self.set_dest(&args[0], value)?;
                false
            }
            Pushs => {
                let value = self.resolve_value(&args[0], ALL_TYPES)?;
                self.data_stack.push(value);
                false
            }
            Pops => {
                let value = self.data_stack.pop()?;
                self.set_dest(&args[0], value)?;
                false
            }
            Call => {
                let target = self.program.label_index(args[0].label_name()?)?;
                self.call_stack.push(self.pc + 1);
                self.pc = target;
                true
            }
            Return => {
                self.pc = self.call_stack.pop()?;
                true
            }
            Add | Sub | Mul | Idiv => {
                let a = self.resolve_value(&args[1], INT)?.as_int().unwrap();
                let b = self.resolve_value(&args[2], INT)?.as_int().unwrap();
                let result = match instruction.op_code() {
                    Add => a.wrapping_add(b),
                    Sub => a.wrapping_sub(b),
                    Mul => a.wrapping_mul(b),
                    Idiv => {
                        if b == 0 {
                            return Err(Error::ZeroDivision("division by zero".to_owned()));
                        }
                        a / b
                    }
                    _ => unreachable!(),
                };
                self.set_dest(&args[0], Value::Int(result))?;
                false
            }
            Lt | Gt => {
                let a = self.resolve_value(&args[1], COMPARABLE)?;
                let b = self.resolve_value(&args[2], COMPARABLE)?;
                if a.val_type() != b.val_type() {
                    return Err(Error::BadOperandType(
                        "LT/GT operands must share the same type".to_owned(),
                    ));
                }
                let ordering = ops::compare_ordered(&a, &b)?;
                let result = if instruction.op_code() == Lt {
                    ordering.is_lt()
                } else {
                    ordering.is_gt()
                };
                self.set_dest(&args[0], Value::Bool(result))?;
                false
            }
            Eq => {
                let a = self.resolve_value(&args[1], COMPARABLE_OR_NIL)?;
                let b = self.resolve_value(&args[2], COMPARABLE_OR_NIL)?;
                let result = nil_aware_equals(&a, &b, "EQ")?;
                self.set_dest(&args[0], Value::Bool(result))?;
                false
            }
            And | Or => {
                let a = self.resolve_value(&args[1], BOOL)?.as_bool().unwrap();
                let b = self.resolve_value(&args[2], BOOL)?.as_bool().unwrap();
                let result = if instruction.op_code() == And {
                    a && b
                } else {
                    a || b
                };
                self.set_dest(&args[0], Value::Bool(result))?;
                false
            }
            Not => {
                let a = self.resolve_value(&args[1], BOOL)?.as_bool().unwrap();
                self.set_dest(&args[0], Value::Bool(!a))?;
                false
            }
            Int2Char => {
                let code_point = self.resolve_value(&args[1], INT)?.as_int().unwrap();
                let s = ops::int_to_char(code_point)?;
                self.set_dest(&args[0], Value::String(s))?;
                false
            }
            Stri2Int => {
                let s = self.resolve_value(&args[1], STRING)?;
                let index = self.resolve_value(&args[2], INT)?.as_int().unwrap();
                let c = ops::char_at(s.as_str().unwrap(), index)?;
                self.set_dest(&args[0], Value::Int(c as i64))?;
                false
            }
            Read => {
                let data_type = args[1].type_name()?;
                let value = self.read_typed(data_type);
                self.set_dest(&args[0], value)?;
                false
            }
            Write => {
                let value = self.resolve_value(&args[0], ALL_TYPES)?;
                self.output
                    .write_all(value.to_string().as_bytes())
                    .map_err(|e| Error::Internal(format!("write to stdout failed: {}", e)))?;
                false
            }
            Concat => {
                let a = self.resolve_value(&args[1], STRING)?;
                let b = self.resolve_value(&args[2], STRING)?;
                let mut s = a.as_str().unwrap().to_owned();
                s.push_str(b.as_str().unwrap());
                self.set_dest(&args[0], Value::String(s))?;
                false
            }
            Strlen => {
                let s = self.resolve_value(&args[1], STRING)?;
                self.set_dest(&args[0], Value::Int(s.as_str().unwrap().chars().count() as i64))?;
                false
            }
            GetChar => {
                let s = self.resolve_value(&args[1], STRING)?;
                let index = self.resolve_value(&args[2], INT)?.as_int().unwrap();
                let c = ops::char_at(s.as_str().unwrap(), index)?;
                self.set_dest(&args[0], Value::String(c.to_string()))?;
                false
            }
            SetChar => {
                let index = self.resolve_value(&args[1], INT)?.as_int().unwrap();
                let replacement = self.resolve_value(&args[2], STRING)?;
                let base = self.memory.get(args[0].var_name()?)?.value()?.clone();
                let base = base.as_str().ok_or_else(|| {
                    Error::BadOperandType("SETCHAR destination must already hold a string".to_owned())
                })?;
                let updated = ops::set_char_at(base, index, replacement.as_str().unwrap())?;
                self.set_dest(&args[0], Value::String(updated))?;
                false
            }
            Type => {
                let name = match args[1].arg_type() {
                    ArgType::Var => match self.memory.get(args[1].var_name()?)?.value() {
                        Ok(value) => value.val_type().name(),
                        Err(_) => "",
                    },
                    _ => args[1].literal_value()?.val_type().name(),
                };
                self.set_dest(&args[0], Value::String(name.to_owned()))?;
                false
            }
            Label => false,
            Jump => {
                self.pc = self.program.label_index(args[0].label_name()?)?;
                true
            }
            JumpIfEq | JumpIfNeq => {
                // The target is resolved unconditionally, not just when taken: an
                // undefined label must fail even if the condition falls through.
                let target = self.program.label_index(args[0].label_name()?)?;
                let a = self.resolve_value(&args[1], COMPARABLE_OR_NIL)?;
                let b = self.resolve_value(&args[2], COMPARABLE_OR_NIL)?;
                let equal = nil_aware_equals(&a, &b, "JUMPIFEQ/JUMPIFNEQ")?;
                let take = if instruction.op_code() == JumpIfEq {
                    equal
                } else {
                    !equal
                };
                if take {
                    self.pc = target;
                    true
                } else {
                    false
                }
            }
            Exit => {
                let code = self.resolve_value(&args[0], INT)?.as_int().unwrap();
                if !(0..=49).contains(&code) {
                    return Err(Error::ExitValueOutOfRange(format!(
                        "exit code {} is outside 0..=49",
                        code
                    )));
                }
                return Ok(Some(code as i32));
            }
            DPrint => {
                let arg = &args[0];
                let value = self.resolve_value(arg, ALL_TYPES)?;
                if arg.arg_type() == ArgType::Var {
                    eprint!(
                        "{} = {}@{}",
                        arg.var_name()?,
                        value.val_type(),
                        value
                    );
                } else {
                    eprint!("{}@{}", value.val_type(), value);
                }
                false
            }
            Break => {
                eprintln!(
                    "pc={} global_vars={} local_depth={} data_stack={} call_stack={}",
                    self.pc,
                    self.memory.global_frame_len(),
                    self.memory.local_frame_depth(),
                    self.data_stack.len(),
                    self.call_stack.len(),
                );
                false
            }
        };

        if !jumped {
            self.pc += 1;
        }
        Ok(None)
    }

    /// `READ`: parses one line from `input` per `data_type`; on EOF or a parse
    /// failure the destination holds nil, never an error.
    fn read_typed(&mut self, data_type: DataType) -> Value {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                warn!("READ reached end of input");
                Value::Nil
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r'].as_ref());
                match data_type {
                    DataType::Int => trimmed
                        .trim()
                        .parse::<i64>()
                        .map(Value::Int)
                        .unwrap_or(Value::Nil),
                    DataType::Bool => Value::Bool(trimmed.trim().eq_ignore_ascii_case("true")),
                    DataType::String => Value::String(trimmed.to_owned()),
                    DataType::Nil => Value::Nil,
                }
            }
            Err(_) => Value::Nil,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

const ALL_TYPES: &[DataType] = &[DataType::Int, DataType::Bool, DataType::String, DataType::Nil];
const INT: &[DataType] = &[DataType::Int];
const BOOL: &[DataType] = &[DataType::Bool];
const STRING: &[DataType] = &[DataType::String];
const COMPARABLE: &[DataType] = &[DataType::Int, DataType::Bool, DataType::String];
const COMPARABLE_OR_NIL: &[DataType] = &[
    DataType::Int,
    DataType::Bool,
    DataType::String,
    DataType::Nil,
];

/// `EQ`'s comparison rule, shared with `JUMPIFEQ`/`JUMPIFNEQ`: operands must share a
/// type unless either is nil, in which case they are equal only if both are nil.
fn nil_aware_equals(a: &Value, b: &Value, op_name: &str) -> Result<bool, Error> {
    if a.val_type() != b.val_type() && a.val_type() != DataType::Nil && b.val_type() != DataType::Nil
    {
        return Err(Error::BadOperandType(format!(
            "{} operands must share the same type unless one is nil",
            op_name
        )));
    }
    Ok(a == b)
}
