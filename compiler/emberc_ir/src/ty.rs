//! Types and their layout.
//!
//! A [`Ty`] is built through [`crate::ir::Module::add_type`] (or the
//! [`TyBuilder`] convenience wrapper), which computes and stores the
//! `(size, align)` pair at construction time. Layout is never supplied by
//! the caller.

use crate::error::Error;
use crate::interner::NameRef;
use crate::syntax::{Abi, TypeRef};
use emberc_abi::size_and_align::{Align, Size};
use emberc_abi::target::Target;
use emberc_utils::index_slice::IdxSlice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The computed memory layout of a type on the module's target.
pub struct Layout {
    /// The size of the type in bytes.
    pub size: Size,
    /// The alignment of the type in bytes; always a power of two.
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The shape of a type.
pub enum TyKind {
    /// No representation; size 0.
    Void,
    /// A signed integer of `bits` bits.
    Int { bits: u32 },
    /// An unsigned integer of `bits` bits.
    Uint { bits: u32 },
    /// An IEEE-style binary float. The widths are of the mantissa (also
    /// referred to as significand) and exponent fields; the sign bit is
    /// accounted for separately, so a `(52, 11)` float occupies 8 bytes.
    Float { mantissa: u32, exponent: u32 },
    /// `depth` levels of indirection to `pointee`. `depth` is at least 1.
    Ptr { pointee: TypeRef, depth: u32 },
    /// An opaque pointer with no pointee type.
    VPtr,
    /// `count` contiguous elements of `elem`.
    Array { elem: TypeRef, count: u64 },
    /// Members laid out sequentially with padding.
    Struct { members: Vec<TypeRef> },
    /// Members sharing storage.
    Union { members: Vec<TypeRef> },
    /// A function signature used as a first-class type. Parameter lists may
    /// end with [`TyKind::Varadic`].
    Func {
        params: Vec<TypeRef>,
        rets: Vec<TypeRef>,
        abi: Abi,
    },
    /// Sentinel for a variadic position in a parameter list.
    Varadic,
}

impl TyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TyKind::Void => "void",
            TyKind::Int { .. } => "int",
            TyKind::Uint { .. } => "uint",
            TyKind::Float { .. } => "float",
            TyKind::Ptr { .. } => "ptr",
            TyKind::VPtr => "vptr",
            TyKind::Array { .. } => "array",
            TyKind::Struct { .. } => "struct",
            TyKind::Union { .. } => "union",
            TyKind::Func { .. } => "function",
            TyKind::Varadic => "varadic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A type registered in a module: its shape, its computed layout, and an
/// optional name for diagnostics.
pub struct Ty {
    pub name: NameRef,
    pub kind: TyKind,
    pub layout: Layout,
}

impl Ty {
    #[inline]
    pub fn size(&self) -> Size {
        self.layout.size
    }

    #[inline]
    pub fn align(&self) -> Align {
        self.layout.align
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TyKind::Int { .. } | TyKind::Uint { .. })
    }

    /// The declared bit width of an integer type.
    pub fn int_bits(&self) -> Option<u32> {
        match self.kind {
            TyKind::Int { bits } | TyKind::Uint { bits } => Some(bits),
            _ => None,
        }
    }
}

/// Computes layouts against a module's type arena and target.
///
/// Aggregate layout has to resolve member references, which is why this
/// borrows the arena rather than living on `TyKind` itself. Members must
/// already be registered when the aggregate is built; the arena's
/// append-only growth makes that ordering natural.
pub struct LayoutCtx<'a> {
    types: &'a IdxSlice<TypeRef, Ty>,
    target: &'a Target,
}

impl<'a> LayoutCtx<'a> {
    pub fn new(types: &'a IdxSlice<TypeRef, Ty>, target: &'a Target) -> Self {
        LayoutCtx { types, target }
    }

    fn pointer_layout(&self) -> Layout {
        let size = Size::from_bits(self.target.pointer_size());
        // The pointer width is always a power-of-two number of bytes.
        let align = Align::from_bytes(size.bytes()).unwrap_or(Align::ONE);
        Layout { size, align }
    }

    fn member(&self, ty: TypeRef) -> Result<&Ty, Error> {
        self.types
            .get(ty)
            .ok_or_else(|| Error::InvalidType("member type is not registered".to_string()))
    }

    /// Computes the layout for a type shape.
    pub fn compute_layout(&self, kind: &TyKind) -> Result<Layout, Error> {
        let pointer = self.pointer_layout();
        let scalar = |size: Size| Layout {
            size,
            align: Align::natural_for_size(size, pointer.align),
        };

        let layout = match kind {
            TyKind::Void | TyKind::Varadic => Layout {
                size: Size::ZERO,
                align: Align::ONE,
            },

            TyKind::Int { bits } | TyKind::Uint { bits } => {
                if *bits == 0 {
                    return Err(Error::BadArgument(
                        "integer type with zero bit width".to_string(),
                    ));
                }
                scalar(Size::from_bits(*bits))
            }

            TyKind::Float { mantissa, exponent } => {
                if *mantissa == 0 || *exponent == 0 {
                    return Err(Error::BadArgument(
                        "float type with zero-width field".to_string(),
                    ));
                }
                // One extra bit for the sign.
                scalar(Size::from_bits(u64::from(*mantissa) + u64::from(*exponent) + 1))
            }

            TyKind::Ptr { pointee, depth } => {
                if *depth == 0 {
                    return Err(Error::BadArgument(
                        "pointer type with zero indirection depth".to_string(),
                    ));
                }
                self.member(*pointee)?;
                pointer
            }

            TyKind::VPtr => pointer,

            TyKind::Array { elem, count } => {
                let elem = self.member(*elem)?;
                let size = elem
                    .size()
                    .checked_mul(*count)
                    .ok_or_else(|| Error::Overflow("array size".to_string()))?;
                Layout {
                    size,
                    align: elem.align(),
                }
            }

            TyKind::Struct { members } => {
                let mut offset = Size::ZERO;
                let mut align = Align::ONE;
                for &member in members {
                    let member = self.member(member)?;
                    offset = offset
                        .align_to(member.align())
                        .and_then(|o| o.checked_add(member.size()))
                        .ok_or_else(|| Error::Overflow("struct size".to_string()))?;
                    align = align.max(member.align());
                }
                let size = offset
                    .align_to(align)
                    .ok_or_else(|| Error::Overflow("struct size".to_string()))?;
                Layout { size, align }
            }

            TyKind::Union { members } => {
                let mut size = Size::ZERO;
                let mut align = Align::ONE;
                for &member in members {
                    let member = self.member(member)?;
                    size = size.max(member.size());
                    align = align.max(member.align());
                }
                Layout { size, align }
            }

            TyKind::Func { params, rets, .. } => {
                for &ty in params.iter().chain(rets) {
                    self.member(ty)?;
                }
                // A function signature has no in-memory size of its own.
                Layout {
                    size: Size::ZERO,
                    align: Align::ONE,
                }
            }
        };

        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BuildConfig, Module};
    use pretty_assertions::assert_eq;

    fn module() -> Module {
        Module::new("layout-tests", BuildConfig::default())
    }

    #[test]
    fn integer_layouts() {
        let mut m = module();
        let i32_ref = m.add_type(None, TyKind::Int { bits: 32 }).unwrap();
        let i1_ref = m.add_type(None, TyKind::Uint { bits: 1 }).unwrap();
        let i24_ref = m.add_type(None, TyKind::Int { bits: 24 }).unwrap();

        let i32_ty = m.ty(i32_ref).unwrap();
        assert_eq!(i32_ty.size().bytes(), 4);
        assert_eq!(i32_ty.align().bytes(), 4);

        let i1_ty = m.ty(i1_ref).unwrap();
        assert_eq!(i1_ty.size().bytes(), 1);
        assert_eq!(i1_ty.align().bytes(), 1);

        // 24 bits round up to 3 bytes; alignment rounds to the next power
        // of two.
        let i24_ty = m.ty(i24_ref).unwrap();
        assert_eq!(i24_ty.size().bytes(), 3);
        assert_eq!(i24_ty.align().bytes(), 4);
    }

    #[test]
    fn float_layout_includes_the_sign_bit() {
        let mut m = module();
        let single = m
            .add_type(None, TyKind::Float { mantissa: 23, exponent: 8 })
            .unwrap();
        let double = m
            .add_type(None, TyKind::Float { mantissa: 52, exponent: 11 })
            .unwrap();

        assert_eq!(m.ty(single).unwrap().size().bytes(), 4);
        assert_eq!(m.ty(double).unwrap().size().bytes(), 8);
        assert_eq!(m.ty(double).unwrap().align().bytes(), 8);
    }

    #[test]
    fn degenerate_scalars_are_rejected() {
        let mut m = module();
        assert!(m.add_type(None, TyKind::Int { bits: 0 }).is_err());
        assert!(m
            .add_type(None, TyKind::Float { mantissa: 0, exponent: 8 })
            .is_err());
    }

    #[test]
    fn pointer_types_use_the_target_width() {
        let mut m = module();
        let i8_ref = m.add_type(None, TyKind::Int { bits: 8 }).unwrap();
        let ptr = m
            .add_type(None, TyKind::Ptr { pointee: i8_ref, depth: 2 })
            .unwrap();
        let vptr = m.add_type(None, TyKind::VPtr).unwrap();

        assert_eq!(m.ty(ptr).unwrap().size().bytes(), 8);
        assert_eq!(m.ty(vptr).unwrap().size().bytes(), 8);
        assert_eq!(m.ty(vptr).unwrap().align().bytes(), 8);

        assert!(m
            .add_type(None, TyKind::Ptr { pointee: i8_ref, depth: 0 })
            .is_err());
    }

    #[test]
    fn aggregate_layouts_pad_members() {
        let mut m = module();
        let i8_ref = m.add_type(None, TyKind::Int { bits: 8 }).unwrap();
        let i32_ref = m.add_type(None, TyKind::Int { bits: 32 }).unwrap();

        // struct { i8; i32 } => 1 byte, 3 bytes padding, 4 bytes => 8 total.
        let s = m
            .add_type(None, TyKind::Struct { members: vec![i8_ref, i32_ref] })
            .unwrap();
        let s_ty = m.ty(s).unwrap();
        assert_eq!(s_ty.size().bytes(), 8);
        assert_eq!(s_ty.align().bytes(), 4);

        // union { i8; i32 } => max size, max alignment.
        let u = m
            .add_type(None, TyKind::Union { members: vec![i8_ref, i32_ref] })
            .unwrap();
        let u_ty = m.ty(u).unwrap();
        assert_eq!(u_ty.size().bytes(), 4);
        assert_eq!(u_ty.align().bytes(), 4);

        // [i32; 10]
        let a = m
            .add_type(None, TyKind::Array { elem: i32_ref, count: 10 })
            .unwrap();
        assert_eq!(m.ty(a).unwrap().size().bytes(), 40);
        assert_eq!(m.ty(a).unwrap().align().bytes(), 4);
    }

    #[test]
    fn function_types_have_no_size() {
        let mut m = module();
        let i32_ref = m.add_type(None, TyKind::Int { bits: 32 }).unwrap();
        let f = m
            .add_type(
                None,
                TyKind::Func {
                    params: vec![i32_ref, i32_ref],
                    rets: vec![i32_ref],
                    abi: Abi::Cdecl,
                },
            )
            .unwrap();
        assert_eq!(m.ty(f).unwrap().size().bytes(), 0);
    }
}
