//! Loads an IPPcode22 XML document into an [`ippcore::program::Program`].
//!
//! The grammar is fixed: a `<program language="IPPcode22">` root holding
//! `<instruction order="N" opcode="OP">` children, each holding up to three
//! `<argN type="...">text</argN>` grandchildren. Structural problems (a
//! missing root attribute, an unknown opcode, a gap in argument numbering)
//! are reported through [`ippcore::error::Error`] so the driver can map them
//! to the same exit codes as execution errors.

use std::collections::BTreeMap;
use std::io::BufRead;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use ippcore::error::Error;
use ippcore::program::{ArgType, Argument, Instruction, OpCode, Program};
use util::EnumFromStrCI;

/// An instruction as seen by the XML reader, before it is reindexed by `order`.
struct RawInstruction {
    op_code: OpCode,
    args: BTreeMap<usize, Argument>,
}

/// What element the reader is currently positioned inside of.
enum Context {
    /// Before the root element has been seen.
    BeforeRoot,
    /// Directly under `<program>`, expecting `<instruction>` siblings.
    InProgram,
    /// Inside an `<instruction order="..." opcode="...">`, collecting `argN` children.
    InInstruction {
        order: i64,
        raw: RawInstruction,
    },
    /// Inside an `<argN type="...">`, accumulating its text content.
    InArgument {
        order: i64,
        raw: RawInstruction,
        position: usize,
        arg_type: ArgType,
        text: String,
    },
}

fn xml_error(err: quick_xml::Error) -> Error {
    Error::MalformedXml(err.to_string())
}

fn attr_str(start: &BytesStart, name: &str) -> Result<Option<String>, Error> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::MalformedXml(e.to_string()))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::MalformedXml(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(start: &BytesStart, name: &str, tag: &str) -> Result<String, Error> {
    attr_str(start, name)?.ok_or_else(|| {
        Error::BadXmlStructure(format!(
            "<{}> is missing required attribute \"{}\"",
            tag, name
        ))
    })
}

fn local_name(start: &BytesStart) -> Result<String, Error> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_owned)
        .map_err(|e| Error::MalformedXml(e.to_string()))
}

/// Parses the `order` attribute: must be a non-negative integer.
fn parse_order(raw: &str) -> Result<i64, Error> {
    let order: i64 = raw
        .parse()
        .map_err(|_| Error::BadInstructionOrder(format!("\"{}\" is not an integer", raw)))?;
    if order < 0 {
        return Err(Error::BadInstructionOrder(format!(
            "instruction order {} is negative",
            order
        )));
    }
    Ok(order)
}

/// Parses an `arg<N>` tag name into its 1-based position.
fn parse_arg_position(tag: &str) -> Result<usize, Error> {
    let digits = tag.strip_prefix("arg").ok_or_else(|| {
        Error::BadXmlStructure(format!("\"<{}>\" is not a valid argument element", tag))
    })?;
    let n: usize = digits.parse().map_err(|_| {
        Error::BadXmlStructure(format!("\"<{}>\" is not a valid argument element", tag))
    })?;
    if n == 0 {
        return Err(Error::BadXmlStructure(
            "argument numbering starts at 1, not 0".to_owned(),
        ));
    }
    Ok(n)
}

/// Checks that the argument positions collected for one instruction are
/// contiguous starting at 1, and returns them in that order (resolves Open
/// Question (c): gapped numbering is rejected, not tolerated).
fn ordered_args(args: BTreeMap<usize, Argument>) -> Result<Vec<Argument>, Error> {
    let expected: Vec<usize> = (1..=args.len()).collect();
    let actual: Vec<usize> = args.keys().copied().collect();
    if actual != expected {
        return Err(Error::BadXmlStructure(format!(
            "argument numbering must be contiguous starting at 1, got {:?}",
            actual
        )));
    }
    Ok(args.into_values().collect())
}

fn finish_argument(
    order: i64,
    mut raw: RawInstruction,
    position: usize,
    arg_type: ArgType,
    text: String,
) -> Result<Context, Error> {
    // Non-string literals never carry meaningful surrounding whitespace, so a
    // pretty-printed document (text on its own indented line) still parses.
    let text = if arg_type == ArgType::String {
        text
    } else {
        text.trim().to_owned()
    };
    if arg_type != ArgType::String && text.is_empty() {
        return Err(Error::BadXmlStructure(format!(
            "argument {} of type {:?} must not be empty",
            position, arg_type
        )));
    }
    if raw.args.insert(position, Argument::new(arg_type, text)).is_some() {
        return Err(Error::BadXmlStructure(format!(
            "argument position {} given more than once",
            position
        )));
    }
    Ok(Context::InInstruction { order, raw })
}

fn finish_instruction(
    order: i64,
    raw: RawInstruction,
    by_order: &mut BTreeMap<i64, Instruction>,
) -> Result<(), Error> {
    let args = ordered_args(raw.args)?;
    by_order.insert(order, Instruction::new(raw.op_code, args));
    Ok(())
}

/// Dispatches one opening tag (`Start` or `Empty`), returning the context to enter.
/// For `Empty` tags the caller immediately follows up by closing that same context.
fn open_element(
    context: Context,
    start: &BytesStart,
    by_order: &mut BTreeMap<i64, Instruction>,
) -> Result<Context, Error> {
    let tag = local_name(start)?;

    match context {
        Context::BeforeRoot => {
            if tag != "program" {
                return Err(Error::BadXmlStructure(format!(
                    "root element must be <program>, found <{}>",
                    tag
                )));
            }
            let language = required_attr(start, "language", "program")?;
            if language != "IPPcode22" {
                return Err(Error::BadXmlStructure(format!(
                    "unsupported language \"{}\", expected \"IPPcode22\"",
                    language
                )));
            }
            Ok(Context::InProgram)
        }

        Context::InProgram => {
            if tag != "instruction" {
                return Err(Error::BadXmlStructure(format!(
                    "expected <instruction>, found <{}>",
                    tag
                )));
            }
            let order = parse_order(&required_attr(start, "order", "instruction")?)?;
            let opcode_raw = required_attr(start, "opcode", "instruction")?;
            let op_code = OpCode::from_str_ci(&opcode_raw).map_err(|_| {
                Error::InvalidOpCode(format!("unknown opcode \"{}\"", opcode_raw))
            })?;
            if by_order.contains_key(&order) {
                return Err(Error::BadInstructionOrder(format!(
                    "instruction order {} appears more than once",
                    order
                )));
            }
            Ok(Context::InInstruction {
                order,
                raw: RawInstruction {
                    op_code,
                    args: BTreeMap::new(),
                },
            })
        }

        Context::InInstruction { order, raw } => {
            let position = parse_arg_position(&tag)?;
            let arg_type_raw = required_attr(start, "type", &tag)?;
            let arg_type = ArgType::from_xml_str(&arg_type_raw)?;
            Ok(Context::InArgument {
                order,
                raw,
                position,
                arg_type,
                text: String::new(),
            })
        }

        Context::InArgument { .. } => Err(Error::BadXmlStructure(
            "argument elements cannot be nested".to_owned(),
        )),
    }
}

/// Closes the current context when its matching end tag (real or implied by
/// a self-closing element) is reached.
fn close_element(context: Context, by_order: &mut BTreeMap<i64, Instruction>) -> Result<Context, Error> {
    match context {
        Context::InArgument {
            order,
            raw,
            position,
            arg_type,
            text,
        } => finish_argument(order, raw, position, arg_type, text),
        Context::InInstruction { order, raw } => {
            finish_instruction(order, raw, by_order)?;
            Ok(Context::InProgram)
        }
        Context::InProgram => Ok(Context::InProgram),
        Context::BeforeRoot => Err(Error::Internal("closed an element before any root".to_owned())),
    }
}

/// Loads a complete `Program` from an XML document read from `reader`.
pub fn load<R: BufRead>(reader: R) -> Result<Program, Error> {
    let mut xml = Reader::from_reader(reader);
    let mut buf = Vec::new();

    let mut by_order: BTreeMap<i64, Instruction> = BTreeMap::new();
    let mut context = Context::BeforeRoot;
    let mut root_seen = false;

    loop {
        buf.clear();
        match xml.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Eof => break,

            Event::Start(start) => {
                context = open_element(context, &start, &mut by_order)?;
                root_seen = true;
            }

            Event::Empty(start) => {
                context = open_element(context, &start, &mut by_order)?;
                context = close_element(context, &mut by_order)?;
                root_seen = true;
            }

            Event::Text(text) => {
                if let Context::InArgument { ref mut text: buf_text, .. } = context {
                    let decoded = text
                        .unescape()
                        .map_err(|e| Error::MalformedXml(e.to_string()))?;
                    buf_text.push_str(&decoded);
                }
            }

            Event::End(_) => {
                context = close_element(context, &mut by_order)?;
            }

            _ => {}
        }
    }

    if !root_seen {
        return Err(Error::BadXmlStructure(
            "document has no <program> root".to_owned(),
        ));
    }

    let instructions: Vec<Instruction> = by_order.into_values().collect();
    debug!("loaded {} instructions", instructions.len());
    let program = Program::new(instructions)?;
    debug!("label table has {} entries", program.len());
    Ok(program)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn load_str(xml: &str) -> Result<Program, Error> {
        load(Cursor::new(xml.as_bytes().to_vec()))
    }

    #[test]
    fn loads_hello_world() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<program language="IPPcode22">
  <instruction order="1" opcode="WRITE">
    <arg1 type="string">Hello\032World</arg1>
  </instruction>
</program>"#;
        let program = load_str(xml).unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(program.instruction_at(0).unwrap().op_code(), OpCode::Write);
    }

    #[test]
    fn reorders_instructions_by_order_attribute() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="5" opcode="LABEL"><arg1 type="label">l2</arg1></instruction>
  <instruction order="1" opcode="LABEL"><arg1 type="label">l1</arg1></instruction>
</program>"#;
        let program = load_str(xml).unwrap();
        assert_eq!(program.label_index("l1").unwrap(), 0);
        assert_eq!(program.label_index("l2").unwrap(), 1);
    }

    #[test]
    fn self_closing_instruction_is_accepted() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="CREATEFRAME"/>
  <instruction order="1" opcode="PUSHFRAME"/>
</program>"#;
        let program = load_str(xml).unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn self_closing_empty_string_argument_is_accepted() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="PUSHS"><arg1 type="string"/></instruction>
</program>"#;
        let program = load_str(xml).unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn wrong_root_tag_is_bad_xml_structure() {
        let xml = r#"<notprogram language="IPPcode22"></notprogram>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 32);
    }

    #[test]
    fn wrong_language_attribute_is_bad_xml_structure() {
        let xml = r#"<program language="OtherLang"></program>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 32);
    }

    #[test]
    fn unknown_opcode_is_invalid_opcode() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="FROBNICATE"></instruction>
</program>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 32);
    }

    #[test]
    fn duplicate_order_is_bad_instruction_order() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="CREATEFRAME"></instruction>
  <instruction order="0" opcode="PUSHFRAME"></instruction>
</program>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 52);
    }

    #[test]
    fn negative_order_is_bad_instruction_order() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="-1" opcode="CREATEFRAME"></instruction>
</program>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 52);
    }

    #[test]
    fn gapped_argument_numbering_is_rejected() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="MOVE">
    <arg1 type="var">GF@x</arg1>
    <arg3 type="int">1</arg3>
  </instruction>
</program>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 32);
    }

    #[test]
    fn empty_non_string_argument_is_rejected() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="PUSHS">
    <arg1 type="int"></arg1>
  </instruction>
</program>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 32);
    }

    #[test]
    fn empty_string_argument_is_allowed() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="PUSHS">
    <arg1 type="string"></arg1>
  </instruction>
</program>"#;
        let program = load_str(xml).unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let xml = r#"<program language="IPPcode22">
  <instruction order="0" opcode="LABEL"><arg1 type="label">l</arg1></instruction>
  <instruction order="1" opcode="LABEL"><arg1 type="label">l</arg1></instruction>
</program>"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 52);
    }

    #[test]
    fn malformed_xml_is_rejected() {
        let xml = r#"<program language="IPPcode22"><instruction order="0" opcode="LABEL">"#;
        let err = load_str(xml).unwrap_err();
        assert_eq!(err.exit_code(), 31);
    }
}
