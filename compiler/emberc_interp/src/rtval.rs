//! Runtime values.
//!
//! The evaluator operates on [`RtValue`]s, not on raw IR bytes; the only
//! place bytes are touched is [`RtValue::from_const`], which materializes a
//! constant payload into its runtime form.

use emberc_ir::error::Error;
use emberc_ir::ir::Module;
use emberc_ir::syntax::TypeRef;
use emberc_ir::ty::TyKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
/// The payload of a runtime value.
pub enum RtKind {
    /// No value.
    Void,
    /// A signed integer, widened to 64 bits for evaluation.
    Int(i64),
    /// An unsigned integer, widened to 64 bits.
    Uint(u64),
    /// A float, widened to f64.
    Float(f64),
    /// A simulated pointer: a base address plus an offset for pointer
    /// arithmetic. Addresses are relative to the evaluator's heap, never
    /// host pointers.
    Ptr { base: u64, offset: u64 },
    /// An undefined value, e.g. an uninitialized local.
    Undef,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// A runtime value together with the type reference it originated from.
pub struct RtValue {
    /// The originating type in the module being executed. For [`RtKind::Void`]
    /// this is the reserved index 0 and carries no meaning.
    pub ty: TypeRef,
    pub kind: RtKind,
}

impl RtValue {
    pub fn void() -> Self {
        RtValue {
            ty: TypeRef::from_usize(0),
            kind: RtKind::Void,
        }
    }

    pub fn int(ty: TypeRef, value: i64) -> Self {
        RtValue {
            ty,
            kind: RtKind::Int(value),
        }
    }

    pub fn uint(ty: TypeRef, value: u64) -> Self {
        RtValue {
            ty,
            kind: RtKind::Uint(value),
        }
    }

    pub fn float(ty: TypeRef, value: f64) -> Self {
        RtValue {
            ty,
            kind: RtKind::Float(value),
        }
    }

    pub fn ptr(ty: TypeRef, base: u64, offset: u64) -> Self {
        RtValue {
            ty,
            kind: RtKind::Ptr { base, offset },
        }
    }

    pub fn undef(ty: TypeRef) -> Self {
        RtValue {
            ty,
            kind: RtKind::Undef,
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self.kind, RtKind::Undef)
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            RtKind::Void => "void",
            RtKind::Int(_) => "int",
            RtKind::Uint(_) => "uint",
            RtKind::Float(_) => "float",
            RtKind::Ptr { .. } => "ptr",
            RtKind::Undef => "undef",
        }
    }

    /// Materializes a constant payload into a runtime value.
    ///
    /// Reads exactly `size` little-endian bytes and interprets them per the
    /// type's variant: sub-8-byte integers are sign- or zero-extended from
    /// their payload, a 4-byte float is widened to f64 before storage.
    pub fn from_const(module: &Module, ty: TypeRef, bytes: &[u8]) -> Result<RtValue, Error> {
        let resolved = module
            .ty(ty)
            .ok_or_else(|| Error::InvalidType("constant type reference out of bounds".to_string()))?;

        let size = resolved.size().bytes() as usize;
        if bytes.len() != size {
            return Err(Error::BadArgument(format!(
                "constant payload is {} bytes but the type is {} bytes",
                bytes.len(),
                size
            )));
        }

        let value = match &resolved.kind {
            TyKind::Void => RtValue::void(),

            TyKind::Int { .. } => {
                let raw = read_le(bytes);
                let bits = (size.min(8) * 8) as u32;
                RtValue::int(ty, sign_extend(raw, bits))
            }

            TyKind::Uint { .. } => RtValue::uint(ty, read_le(bytes)),

            TyKind::Float { .. } => match size {
                4 => {
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(bytes);
                    RtValue::float(ty, f32::from_le_bytes(buf) as f64)
                }
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    RtValue::float(ty, f64::from_le_bytes(buf))
                }
                n => {
                    return Err(Error::BadArgument(format!(
                        "no host encoding for a {}-byte float constant",
                        n
                    )))
                }
            },

            TyKind::Ptr { .. } | TyKind::VPtr => RtValue::ptr(ty, read_le(bytes), 0),

            other => {
                return Err(Error::InvalidType(format!(
                    "a {} constant has no runtime representation",
                    other.as_str()
                )))
            }
        };

        Ok(value)
    }
}

impl fmt::Display for RtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RtKind::Void => write!(f, "void"),
            RtKind::Int(v) => write!(f, "{}", v),
            RtKind::Uint(v) => write!(f, "{}", v),
            RtKind::Float(v) => write!(f, "{}", v),
            RtKind::Ptr { base, offset } => write!(f, "{:#x}+{}", base, offset),
            RtKind::Undef => write!(f, "undef"),
        }
    }
}

/// Reads up to the low 8 bytes of a little-endian payload.
fn read_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

/// Sign-extends the low `bits` bits of `raw`.
pub(crate) fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberc_ir::ir::{BuildConfig, Module};
    use emberc_ir::syntax::Value;
    use emberc_ir::ty::TyKind;

    fn module() -> Module {
        Module::new("rtval-tests", BuildConfig::default())
    }

    #[test]
    fn int_constants_round_trip() {
        let mut m = module();
        let i32_ref = m.add_type(None, TyKind::Int { bits: 32 }).unwrap();

        let c = m.const_int(i32_ref, -42).unwrap();
        let Value::Const { ty, bytes } = c else {
            panic!("expected a constant");
        };
        let v = RtValue::from_const(&m, ty, &bytes).unwrap();
        assert_eq!(v.kind, RtKind::Int(-42));
        assert_eq!(v.ty, i32_ref);
    }

    #[test]
    fn narrow_uint_constants_zero_extend() {
        let mut m = module();
        let u8_ref = m.add_type(None, TyKind::Uint { bits: 8 }).unwrap();

        let c = m.const_uint(u8_ref, 0xFF).unwrap();
        let Value::Const { ty, bytes } = c else {
            panic!("expected a constant");
        };
        assert_eq!(bytes.len(), 1);
        let v = RtValue::from_const(&m, ty, &bytes).unwrap();
        assert_eq!(v.kind, RtKind::Uint(255));
    }

    #[test]
    fn single_precision_floats_widen() {
        let mut m = module();
        let f32_ref = m
            .add_type(None, TyKind::Float { mantissa: 23, exponent: 8 })
            .unwrap();

        let c = m.const_float(f32_ref, 1.5).unwrap();
        let Value::Const { ty, bytes } = c else {
            panic!("expected a constant");
        };
        assert_eq!(bytes.len(), 4);
        let v = RtValue::from_const(&m, ty, &bytes).unwrap();
        assert_eq!(v.kind, RtKind::Float(1.5));
    }

    #[test]
    fn payload_length_is_checked() {
        let mut m = module();
        let i32_ref = m.add_type(None, TyKind::Int { bits: 32 }).unwrap();
        assert!(matches!(
            RtValue::from_const(&m, i32_ref, &[0u8; 2]),
            Err(Error::BadArgument(_))
        ));
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }
}
