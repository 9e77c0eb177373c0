use std::collections::HashMap;

use util::EnumFromStrCI;
use util_derive::EnumFromStrCI;

use crate::error::Error;
use crate::value::{DataType, Value};

/// Syntactic type tag carried by an XML `<argN type="...">` element. Distinct from
/// [`DataType`], which tags a materialized runtime [`Value`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ArgType {
    Int,
    Bool,
    String,
    Nil,
    Label,
    Type,
    Var,
}

impl ArgType {
    pub fn from_xml_str(s: &str) -> Result<ArgType, Error> {
        match s.to_lowercase().as_str() {
            "int" => Ok(ArgType::Int),
            "bool" => Ok(ArgType::Bool),
            "string" => Ok(ArgType::String),
            "nil" => Ok(ArgType::Nil),
            "label" => Ok(ArgType::Label),
            "type" => Ok(ArgType::Type),
            "var" => Ok(ArgType::Var),
            _ => Err(Error::BadXmlStructure(format!(
                "\"{}\" is not a valid argument type",
                s
            ))),
        }
    }

    fn matches_data_type(self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (ArgType::Int, DataType::Int)
                | (ArgType::Bool, DataType::Bool)
                | (ArgType::String, DataType::String)
                | (ArgType::Nil, DataType::Nil)
        )
    }
}

/// The closed set of instruction opcodes, parsed case-insensitively from the XML
/// `opcode` attribute.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumFromStrCI)]
pub enum OpCode {
    Move,
    CreateFrame,
    PushFrame,
    PopFrame,
    DefVar,
    Call,
    Return,
    Pushs,
    Pops,
    Add,
    Sub,
    Mul,
    Idiv,
    Lt,
    Gt,
    Eq,
    And,
    Or,
    Not,
    Int2Char,
    Stri2Int,
    Read,
    Write,
    Concat,
    Strlen,
    GetChar,
    SetChar,
    Type,
    Label,
    Jump,
    JumpIfEq,
    JumpIfNeq,
    Exit,
    DPrint,
    Break,
}

/// One position in an instruction's argument-type pattern, checked by the executor
/// before an instruction acts.
#[derive(Clone, Copy, Debug)]
pub enum Slot {
    /// The argument must be a variable reference (a write destination).
    Dest,
    /// The argument must resolve, directly or through a variable, to one of these types.
    Value(&'static [DataType]),
    /// The argument must be a `label` literal.
    Label,
    /// The argument must be a `type` literal (used by `READ`'s second operand).
    Type,
}

const INT: &[DataType] = &[DataType::Int];
const BOOL: &[DataType] = &[DataType::Bool];
const STRING: &[DataType] = &[DataType::String];
const COMPARABLE: &[DataType] = &[DataType::Int, DataType::Bool, DataType::String];
const COMPARABLE_OR_NIL: &[DataType] = &[DataType::Int, DataType::Bool, DataType::String, DataType::Nil];
const ANY: &[DataType] = &[DataType::Int, DataType::Bool, DataType::String, DataType::Nil];

impl OpCode {
    /// The fixed argument-type pattern for this opcode, in positional order.
    pub fn arg_pattern(self) -> &'static [Slot] {
        use Slot::*;
        match self {
            OpCode::Move => &[Dest, Value(ANY)],
            OpCode::CreateFrame | OpCode::PushFrame | OpCode::PopFrame | OpCode::Return
            | OpCode::Label | OpCode::Break => &[],
            OpCode::DefVar => &[Dest],
            OpCode::Call | OpCode::Jump => &[Slot::Label],
            OpCode::Pushs | OpCode::Write | OpCode::DPrint => &[Value(ANY)],
            OpCode::Pops => &[Dest],
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Idiv => {
                &[Dest, Value(INT), Value(INT)]
            }
            OpCode::Lt | OpCode::Gt => &[Dest, Value(COMPARABLE), Value(COMPARABLE)],
            OpCode::Eq => &[Dest, Value(COMPARABLE_OR_NIL), Value(COMPARABLE_OR_NIL)],
            OpCode::And | OpCode::Or => &[Dest, Value(BOOL), Value(BOOL)],
            OpCode::Not => &[Dest, Value(BOOL)],
            OpCode::Int2Char => &[Dest, Value(INT)],
            OpCode::Stri2Int => &[Dest, Value(STRING), Value(INT)],
            OpCode::Read => &[Dest, Slot::Type],
            OpCode::Concat => &[Dest, Value(STRING), Value(STRING)],
            OpCode::Strlen => &[Dest, Value(STRING)],
            OpCode::GetChar => &[Dest, Value(STRING), Value(INT)],
            OpCode::SetChar => &[Dest, Value(INT), Value(STRING)],
            OpCode::Type => &[Dest, Value(ANY)],
            OpCode::JumpIfEq | OpCode::JumpIfNeq => {
                &[Slot::Label, Value(COMPARABLE_OR_NIL), Value(COMPARABLE_OR_NIL)]
            }
            OpCode::Exit => &[Value(INT)],
        }
    }
}

/// Decodes `\DDD` escape sequences (three decimal digits) into the Unicode code point
/// DDD; any other character passes through unchanged.
pub fn decode_string_escapes(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 3 < chars.len() && chars[i + 1..i + 4].iter().all(|c| c.is_ascii_digit())
        {
            let digits: String = chars[i + 1..i + 4].iter().collect();
            let code: u32 = digits.parse().unwrap();
            if let Some(c) = char::from_u32(code) {
                out.push(c);
            }
            i += 4;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// One `<argN type="...">text</argN>` element: a syntactic type tag plus the raw
/// text, materialized lazily.
#[derive(Clone, Debug)]
pub struct Argument {
    arg_type: ArgType,
    raw: String,
}

impl Argument {
    pub fn new(arg_type: ArgType, raw: String) -> Argument {
        Argument { arg_type, raw }
    }

    pub fn arg_type(&self) -> ArgType {
        self.arg_type
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Materializes a non-`var` literal into a runtime [`Value`].
    pub fn literal_value(&self) -> Result<Value, Error> {
        match self.arg_type {
            ArgType::Int => self.raw.parse::<i64>().map(Value::Int).map_err(|_| {
                Error::BadOperandValue(format!("\"{}\" is not a valid integer literal", self.raw))
            }),
            ArgType::Bool => Ok(Value::Bool(self.raw.eq_ignore_ascii_case("true"))),
            ArgType::String => Ok(Value::String(decode_string_escapes(&self.raw))),
            ArgType::Nil => Ok(Value::Nil),
            _ => Err(Error::Internal(format!(
                "argument of type {:?} has no literal value",
                self.arg_type
            ))),
        }
    }

    /// The fully qualified variable name (`GF@x`, `LF@x`, `TF@x`) this argument names.
    pub fn var_name(&self) -> Result<&str, Error> {
        if self.arg_type == ArgType::Var {
            Ok(&self.raw)
        } else {
            Err(Error::Internal(format!(
                "argument of type {:?} is not a variable reference",
                self.arg_type
            )))
        }
    }

    /// The label name this argument names.
    pub fn label_name(&self) -> Result<&str, Error> {
        if self.arg_type == ArgType::Label {
            Ok(&self.raw)
        } else {
            Err(Error::Internal(format!(
                "argument of type {:?} is not a label reference",
                self.arg_type
            )))
        }
    }

    /// The `type` literal this argument names (as used by `READ`'s second operand).
    pub fn type_name(&self) -> Result<DataType, Error> {
        if self.arg_type != ArgType::Type {
            return Err(Error::Internal(format!(
                "argument of type {:?} is not a type literal",
                self.arg_type
            )));
        }
        match self.raw.as_str() {
            "int" => Ok(DataType::Int),
            "bool" => Ok(DataType::Bool),
            "string" => Ok(DataType::String),
            other => Err(Error::BadOperandType(format!(
                "\"{}\" is not a readable type",
                other
            ))),
        }
    }

    /// Checks this argument against one pattern [`Slot`], per the argument-type
    /// validation rules: a `var` argument is accepted wherever a value is expected
    /// (its own type is checked later, when the value is resolved); a literal must
    /// match the slot's required concrete type exactly.
    pub fn check_slot(&self, slot: Slot) -> Result<(), Error> {
        match slot {
            Slot::Dest => {
                if self.arg_type == ArgType::Var {
                    Ok(())
                } else {
                    Err(Error::BadOperandType(format!(
                        "expected a variable, got a {:?} literal",
                        self.arg_type
                    )))
                }
            }
            Slot::Value(accepted) => {
                if self.arg_type == ArgType::Var {
                    return Ok(());
                }
                let ok = match self.arg_type {
                    ArgType::Int => accepted.contains(&DataType::Int),
                    ArgType::Bool => accepted.contains(&DataType::Bool),
                    ArgType::String => accepted.contains(&DataType::String),
                    ArgType::Nil => accepted.contains(&DataType::Nil),
                    _ => false,
                };
                if ok {
                    Ok(())
                } else {
                    Err(Error::BadOperandType(format!(
                        "argument of type {:?} is not acceptable here",
                        self.arg_type
                    )))
                }
            }
            Slot::Label => {
                if self.arg_type == ArgType::Label {
                    Ok(())
                } else {
                    Err(Error::BadOperandType(format!(
                        "expected a label, got a {:?} literal",
                        self.arg_type
                    )))
                }
            }
            Slot::Type => {
                if self.arg_type == ArgType::Type {
                    Ok(())
                } else {
                    Err(Error::BadOperandType(format!(
                        "expected a type literal, got a {:?} literal",
                        self.arg_type
                    )))
                }
            }
        }
    }

    /// Checks whether a resolved runtime value's type satisfies a [`Slot::Value`] set.
    pub fn value_satisfies(data_type: DataType, accepted: &[DataType]) -> bool {
        accepted.contains(&data_type)
    }
}

/// One `<instruction order="N" opcode="OP">` element: an opcode and its positional
/// arguments. Argument numbering is validated contiguous from 1 by the loader, so
/// position `i` here corresponds to XML `arg{i+1}`.
#[derive(Clone, Debug)]
pub struct Instruction {
    op_code: OpCode,
    args: Vec<Argument>,
}

impl Instruction {
    pub fn new(op_code: OpCode, args: Vec<Argument>) -> Instruction {
        Instruction { op_code, args }
    }

    pub fn op_code(&self) -> OpCode {
        self.op_code
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    pub fn arg(&self, position: usize) -> Option<&Argument> {
        self.args.get(position)
    }

    /// Validates this instruction's arguments against its opcode's fixed pattern.
    pub fn check_arg_types(&self) -> Result<(), Error> {
        let pattern = self.op_code.arg_pattern();

        if self.args.len() > pattern.len() {
            return Err(Error::TooFewInstructionArgs(format!(
                "{:?} takes {} argument(s), got {}",
                self.op_code,
                pattern.len(),
                self.args.len()
            )));
        }

        for (position, slot) in pattern.iter().enumerate() {
            let arg = self.args.get(position).ok_or_else(|| {
                Error::MissingInstructionArg(format!(
                    "{:?} is missing argument {}",
                    self.op_code,
                    position + 1
                ))
            })?;
            arg.check_slot(*slot)?;
        }

        Ok(())
    }
}

/// Ordered instruction sequence plus a resolved label table, as produced by the loader.
#[derive(Debug)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Program {
    /// Builds a Program from instructions already sorted by `order`, indexing labels
    /// and failing `DuplicateLabel` on a repeated name.
    pub fn new(instructions: Vec<Instruction>) -> Result<Program, Error> {
        let mut labels = HashMap::new();

        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.op_code() == OpCode::Label {
                let name = instruction
                    .arg(0)
                    .ok_or_else(|| {
                        Error::MissingInstructionArg("LABEL is missing argument 1".to_owned())
                    })?
                    .label_name()?
                    .to_owned();
                if labels.insert(name.clone(), index).is_some() {
                    return Err(Error::DuplicateLabel(format!(
                        "label \"{}\" is defined more than once",
                        name
                    )));
                }
            }
        }

        Ok(Program {
            instructions,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instruction_at(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn label_index(&self, name: &str) -> Result<usize, Error> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndefinedLabel(format!("label \"{}\" is not defined", name)))
    }
}
