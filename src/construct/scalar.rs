//! Null and primitive scalar strategies.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};

use crate::construct::{Construction, NodeDeserializer, ScalarEvent, next_scalar};
use crate::deferred::Constructed;
use crate::error::Error;
use crate::events::{Event, EventSource};
use crate::options::Cfg;
use crate::parse_scalars::{
    cast_f32, cast_int, classify_int, core_bool, is_float, is_null, parse_float, parse_int,
    parse_strict_bool, parse_yaml11_bool,
};
use crate::tags::{CoreTag, can_parse_into_string, core_tag, is_null_tag};
use crate::types::{FloatWidth, IntWidth, TypeKind, TypeRef};
use crate::value::Value;

/// Claims null scalars (`~`, `null`, empty, or `!!null`) for nullable targets.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStrategy;

impl NodeDeserializer for NullStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        if !ty.is_nullable() || ctx.in_key() {
            return Ok(None);
        }
        let claim = match events.peek()? {
            Some(Event::Scalar {
                value, style, tag, ..
            }) => {
                is_null_tag(tag.as_deref())
                    || (tag.is_none() && style.is_plain() && is_null(value))
            }
            _ => false,
        };
        if !claim {
            return Ok(None);
        }
        events.next()?;
        Ok(Some(Value::Null.into()))
    }
}

/// Claims scalars for primitive, enum and untyped targets.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarStrategy;

impl NodeDeserializer for ScalarStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        if !matches!(events.peek()?, Some(Event::Scalar { .. })) {
            return Ok(None);
        }
        let target = ty.underlying();
        if !(target.is_scalar() || target.is_any()) {
            return Ok(None);
        }
        let scalar = next_scalar(events)?;
        let span = scalar.span;
        let value = convert(&scalar, target, ctx.cfg(), ctx.in_key()).map_err(|e| e.with_span_if_unknown(span))?;
        Ok(Some(value.into()))
    }
}

fn convert(scalar: &ScalarEvent, ty: &TypeRef, cfg: &Cfg, in_key: bool) -> Result<Value, Error> {
    let text = scalar.value.as_str();
    match &ty.kind {
        TypeKind::Any => infer(scalar, cfg, in_key),
        TypeKind::Bool => parse_bool(text, cfg).map(Value::Bool),
        TypeKind::Int(width) => int_for_width(parse_int(text)?, *width),
        TypeKind::Float(FloatWidth::F64) => parse_float(text).map(Value::Float),
        TypeKind::Float(FloatWidth::F32) => Ok(Value::Float(cast_f32(parse_float(text)?)? as f64)),
        TypeKind::Str if can_parse_into_string(scalar.tag.as_deref()) => {
            Ok(Value::Str(scalar.value.clone()))
        }
        TypeKind::Str => Err(Error::format(format!(
            "a scalar tagged `{}` cannot be read as `{}`",
            scalar.tag.as_deref().unwrap_or_default(),
            ty.name
        ))),
        TypeKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(Error::format(format!(
                    "expected a single character, found `{text}`"
                ))),
            }
        }
        TypeKind::Bytes => decode_binary(text).map(Value::Bytes),
        TypeKind::Enum { variants } => {
            let found = variants
                .iter()
                .find(|v| v.as_str() == text)
                .or_else(|| variants.iter().find(|v| v.eq_ignore_ascii_case(text)));
            match found {
                Some(v) => Ok(Value::Variant(v.clone())),
                None => Err(Error::format(format!(
                    "unknown variant `{text}` of `{}`, expected one of: {}",
                    ty.name,
                    variants.join(", ")
                ))),
            }
        }
        _ => Err(Error::shape(format!(
            "unable to deserialize `{}` from scalar",
            ty.name
        ))),
    }
}

fn parse_bool(text: &str, cfg: &Cfg) -> Result<bool, Error> {
    if cfg.strict_booleans {
        parse_strict_bool(text)
    } else {
        parse_yaml11_bool(text)
    }
}

fn int_for_width(v: i128, width: IntWidth) -> Result<Value, Error> {
    let name = width.name();
    Ok(match width {
        IntWidth::I8 => Value::Int(cast_int::<i8>(v, name)?.into()),
        IntWidth::I16 => Value::Int(cast_int::<i16>(v, name)?.into()),
        IntWidth::I32 => Value::Int(cast_int::<i32>(v, name)?.into()),
        IntWidth::I64 => Value::Int(cast_int::<i64>(v, name)?),
        IntWidth::U8 => Value::UInt(cast_int::<u8>(v, name)?.into()),
        IntWidth::U16 => Value::UInt(cast_int::<u16>(v, name)?.into()),
        IntWidth::U32 => Value::UInt(cast_int::<u32>(v, name)?.into()),
        IntWidth::U64 => Value::UInt(cast_int::<u64>(v, name)?),
    })
}

/// Untyped integers are `Int` when they fit, `UInt` above `i64::MAX`, nothing beyond.
fn untyped_int(v: i128) -> Option<Value> {
    match i64::try_from(v) {
        Ok(i) => Some(Value::Int(i)),
        Err(_) => u64::try_from(v).ok().map(Value::UInt),
    }
}

pub(crate) fn decode_binary(text: &str) -> Result<Vec<u8>, Error> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    B64.decode(cleaned.as_bytes())
        .map_err(|e| Error::format(format!("invalid !!binary base64: {e}")))
}

/// Type an untyped scalar: explicit core tags first, then the implicit resolution of
/// plain scalars when enabled.
fn infer(scalar: &ScalarEvent, cfg: &Cfg, in_key: bool) -> Result<Value, Error> {
    let text = scalar.value.as_str();
    if let Some(tag) = scalar.tag.as_deref() {
        return match core_tag(tag) {
            Some(CoreTag::Int) => untyped_int(parse_int(text)?)
                .ok_or_else(|| Error::overflow(format!("value too large for an integer: `{text}`"))),
            Some(CoreTag::Float) => parse_float(text).map(Value::Float),
            Some(CoreTag::Bool) => parse_bool(text, cfg).map(Value::Bool),
            Some(CoreTag::Binary) => decode_binary(text).map(Value::Bytes),
            Some(CoreTag::Null) => Ok(Value::Null),
            Some(CoreTag::Seq | CoreTag::Map | CoreTag::Set) => Err(Error::shape(format!(
                "tag `{tag}` cannot be applied to a scalar"
            ))),
            Some(CoreTag::Str | CoreTag::Timestamp) | None => Ok(Value::Str(scalar.value.clone())),
        };
    }
    if in_key || !cfg.infer_scalar_types || !scalar.style.is_plain() {
        return Ok(Value::Str(scalar.value.clone()));
    }
    if is_null(text) {
        return Ok(Value::Null);
    }
    if let Some(b) = core_bool(text) {
        return Ok(Value::Bool(b));
    }
    if classify_int(text).is_some() {
        // Magnitudes beyond u64 stay text rather than failing an untyped load.
        let value = parse_int(text).ok().and_then(untyped_int);
        return Ok(value.unwrap_or_else(|| Value::Str(scalar.value.clone())));
    }
    if is_float(text) {
        return parse_float(text).map(Value::Float);
    }
    Ok(Value::Str(scalar.value.clone()))
}
