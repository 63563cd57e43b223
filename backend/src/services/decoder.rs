//! Decodes raw logs against a contract's JSON ABI into named, JSON-ready
//! arguments.
//!
//! Integers wider than 48 bits are emitted as decimal strings so that
//! `contract_events.args` never holds a number a JSON (double) or `BIGINT`
//! reader would round or overflow.
//! The choice is driven by the declared ABI type, not the value, so a given
//! argument has the same JSON shape in every row.

use std::collections::HashMap;

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::{Event, EventParam, JsonAbi, Param},
    primitives::B256,
};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log has no signature topic")]
    MissingSignatureTopic,

    #[error("no event in the ABI matches signature {0}")]
    UnknownEventSignature(B256),

    #[error("event {event} expects {expected} topics, log has {found}")]
    TopicCountMismatch {
        event: String,
        expected: usize,
        found: usize,
    },

    #[error("event {event} parameter {param} has an unsupported type: {reason}")]
    InvalidParamType {
        event: String,
        param: String,
        reason: String,
    },

    #[error("event {event} parameter {param} has a malformed topic: {reason}")]
    InvalidTopic {
        event: String,
        param: String,
        reason: String,
    },

    #[error("event {event} has malformed data: {reason}")]
    InvalidData { event: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    pub name: String,
    /// Object keyed by parameter name, in ABI order.
    pub args: Value,
}

/// Event lookup by signature topic. Anonymous events carry no signature
/// topic and cannot be matched, so they are left out.
#[derive(Debug, Clone, Default)]
pub struct EventDecoder {
    events: HashMap<B256, Event>,
}

impl EventDecoder {
    pub fn new(abi: &JsonAbi) -> Self {
        let events = abi
            .events()
            .filter(|event| !event.anonymous)
            .map(|event| (event.selector(), event.clone()))
            .collect();

        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn decode(&self, topics: &[B256], data: &[u8]) -> Result<DecodedLog, DecodeError> {
        let signature = topics.first().ok_or(DecodeError::MissingSignatureTopic)?;
        let event = self
            .events
            .get(signature)
            .ok_or(DecodeError::UnknownEventSignature(*signature))?;

        let expected = 1 + event.inputs.iter().filter(|input| input.indexed).count();
        if topics.len() != expected {
            return Err(DecodeError::TopicCountMismatch {
                event: event.name.clone(),
                expected,
                found: topics.len(),
            });
        }

        let types = event
            .inputs
            .iter()
            .map(|input| resolve_type(event, input))
            .collect::<Result<Vec<_>, _>>()?;

        let body_types: Vec<DynSolType> = event
            .inputs
            .iter()
            .zip(&types)
            .filter(|(input, _)| !input.indexed)
            .map(|(_, ty)| ty.clone())
            .collect();

        let mut body_values = decode_body(event, body_types, data)?.into_iter();
        let mut indexed_topics = topics[1..].iter();
        let mut args = Map::with_capacity(event.inputs.len());

        for (position, (input, ty)) in event.inputs.iter().zip(&types).enumerate() {
            let value = if input.indexed {
                let topic = indexed_topics.next().ok_or(DecodeError::TopicCountMismatch {
                    event: event.name.clone(),
                    expected,
                    found: topics.len(),
                })?;
                decode_topic(ty, topic).map_err(|e| DecodeError::InvalidTopic {
                    event: event.name.clone(),
                    param: param_label(input, position),
                    reason: e.to_string(),
                })?
            } else {
                body_values.next().ok_or_else(|| DecodeError::InvalidData {
                    event: event.name.clone(),
                    reason: format!("missing value for {}", param_label(input, position)),
                })?
            };

            let label = param_label(input, position);
            let value = normalize(value, &input.components).map_err(|reason| {
                DecodeError::InvalidData {
                    event: event.name.clone(),
                    reason: format!("{}: {}", label, reason),
                }
            })?;
            args.insert(label, value);
        }

        Ok(DecodedLog {
            name: event.name.clone(),
            args: Value::Object(args),
        })
    }
}

fn resolve_type(event: &Event, input: &EventParam) -> Result<DynSolType, DecodeError> {
    input.resolve().map_err(|e| DecodeError::InvalidParamType {
        event: event.name.clone(),
        param: input.name.clone(),
        reason: e.to_string(),
    })
}

fn decode_body(
    event: &Event,
    body_types: Vec<DynSolType>,
    data: &[u8],
) -> Result<Vec<DynSolValue>, DecodeError> {
    if body_types.is_empty() {
        return Ok(Vec::new());
    }

    let decoded = DynSolType::Tuple(body_types)
        .abi_decode_params(data)
        .map_err(|e| DecodeError::InvalidData {
            event: event.name.clone(),
            reason: e.to_string(),
        })?;

    Ok(match decoded {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    })
}

/// Reference types are indexed by the keccak hash of their encoding, so only
/// the hash is recoverable from the topic.
fn decode_topic(ty: &DynSolType, topic: &B256) -> alloy::dyn_abi::Result<DynSolValue> {
    match ty {
        DynSolType::String
        | DynSolType::Bytes
        | DynSolType::Array(_)
        | DynSolType::FixedArray(..)
        | DynSolType::Tuple(_) => Ok(DynSolValue::FixedBytes(*topic, 32)),
        _ => ty.abi_decode(topic.as_slice()),
    }
}

fn param_label(input: &EventParam, position: usize) -> String {
    if input.name.is_empty() {
        position.to_string()
    } else {
        input.name.clone()
    }
}

/// Widest integer type stored as a JSON number. Every value of a type this
/// narrow is exact in an IEEE double and in a Postgres `BIGINT`.
pub const MAX_JSON_NUMBER_BITS: usize = 48;

/// Converts a decoded value into its stored JSON form. `components` names
/// the fields of tuples (and of tuple array elements). Values with no stored
/// form are reported as an error message.
pub fn normalize(value: DynSolValue, components: &[Param]) -> Result<Value, String> {
    Ok(match value {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Int(i, bits) if bits <= MAX_JSON_NUMBER_BITS => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, bits) if bits <= MAX_JSON_NUMBER_BITS => u64::try_from(u)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(u.to_string())),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::Address(address) => Value::String(format!("{address:#x}")),
        DynSolValue::FixedBytes(word, size) => Value::String(to_hex(&word[..size.min(32)])),
        DynSolValue::Bytes(bytes) => Value::String(to_hex(&bytes)),
        DynSolValue::String(s) => Value::String(s),
        DynSolValue::Function(function) => Value::String(to_hex(function.as_slice())),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => Value::Array(
            values
                .into_iter()
                .map(|value| normalize(value, components))
                .collect::<Result<_, _>>()?,
        ),
        DynSolValue::Tuple(values) => normalize_tuple(values, components)?,
        #[allow(unreachable_patterns)]
        other => return Err(format!("unsupported value {:?}", other.as_type())),
    })
}

fn normalize_tuple(values: Vec<DynSolValue>, components: &[Param]) -> Result<Value, String> {
    let named = components.len() == values.len()
        && components.iter().all(|component| !component.name.is_empty());

    if named {
        Ok(Value::Object(
            components
                .iter()
                .zip(values)
                .map(|(component, value)| {
                    normalize(value, &component.components).map(|v| (component.name.clone(), v))
                })
                .collect::<Result<_, _>>()?,
        ))
    } else {
        Ok(Value::Array(
            values
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    let inner = components
                        .get(i)
                        .map(|component| component.components.as_slice())
                        .unwrap_or(&[]);
                    normalize(value, inner)
                })
                .collect::<Result<_, _>>()?,
        ))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
