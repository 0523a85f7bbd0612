//! Interval records: a value of an attribute over a `[start, end]` range.

use std::fmt;

use crate::{
    error::Result,
    layout::{self, interval, Field, INTERVAL_RECORD_SIZE},
};

/// Tag describing how an interval's stored value is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ValueType {
    #[display(fmt = "int32")]
    Int32,
    #[display(fmt = "str")]
    Str,
    #[display(fmt = "uint32")]
    UInt32,
    #[display(fmt = "float")]
    Float,
    /// Unrecognized tags are kept as is.
    #[display(fmt = "{}", _0)]
    Other(u8),
}

impl ValueType {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => ValueType::Int32,
            1 => ValueType::Str,
            2 => ValueType::UInt32,
            3 => ValueType::Float,
            other => ValueType::Other(other),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            ValueType::Int32 => 0,
            ValueType::Str => 1,
            ValueType::UInt32 => 2,
            ValueType::Float => 3,
            ValueType::Other(tag) => tag,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalRecord {
    pub start: u32,
    pub end: u32,
    pub attribute: u32,
    pub value_type: ValueType,
    /// Raw stored value. For strings, a block relative offset into the variable data region.
    pub value: u32,
}

impl IntervalRecord {
    /// Decodes one record from exactly [INTERVAL_RECORD_SIZE] bytes.
    pub fn read(record: &[u8]) -> Result<Self> {
        let record = layout::region(record, "interval", 0, INTERVAL_RECORD_SIZE)?;
        Ok(IntervalRecord {
            start: interval::START.read(record)?,
            end: interval::END.read(record)?,
            attribute: interval::ATTRIBUTE.read(record)?,
            value_type: ValueType::from_tag(interval::VALUE_TYPE.read(record)?),
            value: interval::VALUE.read(record)?,
        })
    }

    /// Interprets the raw value according to its type.
    /// `block` is the block this record was decoded from, needed to follow string offsets.
    pub fn interpret(&self, block: &[u8]) -> Value {
        match self.value_type {
            ValueType::Int32 => Value::Int32(self.value as i32),
            ValueType::UInt32 => Value::UInt32(self.value),
            ValueType::Float => Value::Float(f32::from_bits(self.value)),
            ValueType::Str => match read_var_string(block, self.value) {
                Some(s) => Value::Str(s),
                None => Value::Raw(self.value),
            },
            ValueType::Other(_) => Value::Raw(self.value),
        }
    }
}

/// Variable data strings are a `u32` length followed by that many bytes.
fn read_var_string(block: &[u8], offset: u32) -> Option<String> {
    let len = Field::<u32>::at_offset("string length", offset as usize)
        .read(block)
        .ok()?;
    let bytes = layout::region(
        block,
        "string",
        (offset as usize).checked_add(Field::<u32>::size())?,
        len as usize,
    )
    .ok()?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// An interval value as the renderers show it.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    Float(f32),
    Str(String),
    /// Value whose type is unknown, or a string which could not be followed.
    Raw(u32),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Raw(v) => write!(f, "{}", v),
        }
    }
}
