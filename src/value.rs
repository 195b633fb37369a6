use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// Input accepted by the body and query ingestion calls.
///
/// Every caller-facing `send*` call converts its argument into one of these
/// variants first, so ingestion dispatches on a closed set of kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum SendValue {
    String(String),
    Integer(i128),
    Float(f64),
    Boolean(bool),
    Record(Value),
    Sequence(Vec<Value>),
    Map(Map<String, Value>),
    Optional(Option<Box<SendValue>>),
}

impl SendValue {
    /// Serializes a record through `serde_json`. Any `Serialize` type is
    /// accepted; the accumulator later requires the result to be an object.
    pub fn record<T>(record: &T) -> crate::Result<Self>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_value(record)
            .map(Self::Record)
            .map_err(Error::decode_record)
    }

    pub fn sequence<T>(items: &[T]) -> crate::Result<Self>
    where
        T: Serialize,
    {
        items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Sequence)
            .map_err(Error::decode_record)
    }

    pub fn none() -> Self {
        Self::Optional(None)
    }
}

impl From<&str> for SendValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for SendValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for SendValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for SendValue {
                fn from(value: $ty) -> Self {
                    Self::Integer(i128::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<isize> for SendValue {
    fn from(value: isize) -> Self {
        Self::Integer(value as i128)
    }
}

impl From<usize> for SendValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as i128)
    }
}

impl From<f64> for SendValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for SendValue {
    fn from(value: f32) -> Self {
        // Widen through the shortest f32 text so 0.1f32 stays "0.1".
        let widened = value.to_string().parse::<f64>().unwrap_or(f64::from(value));
        Self::Float(widened)
    }
}

impl From<bool> for SendValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Map<String, Value>> for SendValue {
    fn from(value: Map<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<Value>> for SendValue {
    fn from(value: Vec<Value>) -> Self {
        Self::Sequence(value)
    }
}

impl From<Value> for SendValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(map),
            Value::Array(items) => Self::Sequence(items),
            Value::String(text) => Self::String(text),
            Value::Number(number) => Self::String(number.to_string()),
            Value::Bool(flag) => Self::Boolean(flag),
            Value::Null => Self::Optional(None),
        }
    }
}

impl<T> From<Option<T>> for SendValue
where
    T: Into<SendValue>,
{
    fn from(value: Option<T>) -> Self {
        Self::Optional(value.map(|inner| Box::new(inner.into())))
    }
}
