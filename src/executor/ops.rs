use std::cmp::Ordering;
use std::convert::TryFrom;

use crate::error::Error;
use crate::value::Value;

/// `INT2CHAR`: the single-character string at Unicode code point `code_point`.
pub fn int_to_char(code_point: i64) -> Result<String, Error> {
    let code = u32::try_from(code_point)
        .map_err(|_| Error::BadStringUsage(format!("{} is not a valid code point", code_point)))?;
    char::from_u32(code)
        .map(|c| c.to_string())
        .ok_or_else(|| Error::BadStringUsage(format!("{} is not a valid code point", code_point)))
}

fn non_negative_index(index: i64) -> Result<usize, Error> {
    usize::try_from(index)
        .map_err(|_| Error::BadStringUsage(format!("index {} is negative", index)))
}

/// `STRI2INT`/`GETCHAR`: the character at 0-based `index` within `s`.
pub fn char_at(s: &str, index: i64) -> Result<char, Error> {
    let index = non_negative_index(index)?;
    s.chars()
        .nth(index)
        .ok_or_else(|| Error::BadStringUsage(format!("index {} is outside the string", index)))
}

/// `SETCHAR`: `base` with the code point at `index` replaced by the first code point
/// of `replacement`. Fails on an out-of-range index or an empty replacement.
pub fn set_char_at(base: &str, index: i64, replacement: &str) -> Result<String, Error> {
    let first = replacement
        .chars()
        .next()
        .ok_or_else(|| Error::BadStringUsage("replacement string is empty".to_owned()))?;
    let index = non_negative_index(index)?;

    let mut chars: Vec<char> = base.chars().collect();
    if index >= chars.len() {
        return Err(Error::BadStringUsage(format!(
            "index {} is outside the string",
            index
        )));
    }
    chars[index] = first;
    Ok(chars.into_iter().collect())
}

/// `LT`/`GT`: orders two same-type values drawn from {int, bool, string}. Bools order
/// false before true; strings compare lexicographically by code point.
pub fn compare_ordered(a: &Value, b: &Value) -> Result<Ordering, Error> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Ok(x.chars().cmp(y.chars())),
        _ => Err(Error::BadOperandType(
            "operands are not ordered-comparable".to_owned(),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_to_char_rejects_out_of_range_code_points() {
        assert!(int_to_char(-1).is_err());
        assert!(int_to_char(0x110000).is_err());
        assert_eq!(int_to_char(65).unwrap(), "A");
    }

    #[test]
    fn char_at_rejects_index_past_end() {
        assert!(char_at("hi", 2).is_err());
        assert_eq!(char_at("hi", 1).unwrap(), 'i');
    }

    #[test]
    fn set_char_at_rejects_empty_replacement_and_bad_index() {
        assert!(set_char_at("hello", 0, "").is_err());
        assert!(set_char_at("hello", 10, "x").is_err());
        assert_eq!(set_char_at("hello", 0, "y").unwrap(), "yello");
    }

    #[test]
    fn compare_ordered_orders_bools_false_before_true() {
        assert_eq!(
            compare_ordered(&Value::Bool(false), &Value::Bool(true)).unwrap(),
            Ordering::Less
        );
    }
}
