//! C ABI types, registered by target word size.
//!
//! Registered names:
//! `C@bool`, `C@char`, `C@unsigned char`, `C@short`, `C@unsigned short`,
//! `C@int`, `C@unsigned int`, `C@long`, `C@unsigned long`, `C@long long`,
//! `C@unsigned long long`, `C@int8_t` .. `C@uint64_t`, `C@float`,
//! `C@double`, `C@long double`, `C@void`.

use emberc_ir::error::Error;
use emberc_ir::ir::Module;
use emberc_ir::syntax::TypeRef;
use emberc_ir::ty::Ty;
use tracing::debug;

fn add_int(module: &mut Module, name: &str, bits: u32) -> Result<(), Error> {
    module.type_builder().named(name).int(bits).build()?;
    Ok(())
}

fn add_uint(module: &mut Module, name: &str, bits: u32) -> Result<(), Error> {
    module.type_builder().named(name).uint(bits).build()?;
    Ok(())
}

fn add_float(module: &mut Module, name: &str, mantissa: u32, exponent: u32) -> Result<(), Error> {
    module.type_builder().named(name).float(mantissa, exponent).build()?;
    Ok(())
}

fn add_void(module: &mut Module, name: &str) -> Result<(), Error> {
    module.type_builder().named(name).void().build()?;
    Ok(())
}

/// Registers the C scalar types into `module`, keyed by the target's word
/// size.
///
/// Word-size-dependent widths follow the conventional data models:
///
/// | name | 32-bit | 64-bit |
/// |---|---|---|
/// | `char` | 8 | 8 |
/// | `short` | 16 | 16 |
/// | `int` | 32 | 32 |
/// | `long` | 32 | 64 |
/// | `long long` | 64 | 64 |
///
/// Fixed-width and floating types are the same across word sizes; `float`
/// is IEEE 754 single `(23, 8)`, `double` and `long double` are IEEE 754
/// double `(52, 11)`.
pub fn register_types(module: &mut Module) -> Result<(), Error> {
    let word_size = module.target().word_size();
    debug!(word_size, "registering C types");

    let long_bits = match word_size {
        32 => 32,
        64 => 64,
        other => {
            return Err(Error::BadArgument(format!(
                "no C data model for a {}-bit word size",
                other
            )))
        }
    };

    add_uint(module, "C@bool", 1)?;

    add_int(module, "C@char", 8)?;
    add_uint(module, "C@unsigned char", 8)?;

    add_int(module, "C@short", 16)?;
    add_uint(module, "C@unsigned short", 16)?;

    add_int(module, "C@int", 32)?;
    add_uint(module, "C@unsigned int", 32)?;

    add_int(module, "C@long", long_bits)?;
    add_uint(module, "C@unsigned long", long_bits)?;

    add_int(module, "C@long long", 64)?;
    add_uint(module, "C@unsigned long long", 64)?;

    // Fixed-width integer types.
    add_int(module, "C@int8_t", 8)?;
    add_uint(module, "C@uint8_t", 8)?;
    add_int(module, "C@int16_t", 16)?;
    add_uint(module, "C@uint16_t", 16)?;
    add_int(module, "C@int32_t", 32)?;
    add_uint(module, "C@uint32_t", 32)?;
    add_int(module, "C@int64_t", 64)?;
    add_uint(module, "C@uint64_t", 64)?;

    add_float(module, "C@float", 23, 8)?; // IEEE 754 single
    add_float(module, "C@double", 52, 11)?; // IEEE 754 double
    add_float(module, "C@long double", 52, 11)?;

    add_void(module, "C@void")?;

    Ok(())
}

/// Finds a registered type by its interned name.
///
/// This is a linear scan over the module's type arena; modules register a
/// few dozen frontend types, so an index has not been worth carrying.
pub fn type_by_name<'m>(module: &'m Module, name: &str) -> Option<(TypeRef, &'m Ty)> {
    module
        .types()
        .iter_enumerated()
        .find(|(_, ty)| module.name_of(ty.name) == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberc_abi::target::{Arch, Endian, ObjectFormat, Os, Target};
    use emberc_ir::ir::BuildConfig;
    use emberc_ir::ty::TyKind;
    use pretty_assertions::assert_eq;

    fn module_for(target: Target) -> Module {
        let config = BuildConfig {
            target,
            ..BuildConfig::default()
        };
        let mut module = Module::new("c-types", config);
        register_types(&mut module).unwrap();
        module
    }

    #[test]
    fn int_is_32_bits_on_a_64_bit_target() {
        let module = module_for(Target::host());
        let (_, ty) = type_by_name(&module, "C@int").unwrap();
        assert_eq!(ty.kind, TyKind::Int { bits: 32 });
        assert_eq!(ty.size().bytes(), 4);
        assert_eq!(ty.align().bytes(), 4);
    }

    #[test]
    fn long_follows_the_word_size() {
        let module = module_for(Target::host());
        let (_, ty) = type_by_name(&module, "C@long").unwrap();
        assert_eq!(ty.kind, TyKind::Int { bits: 64 });
        assert_eq!(ty.size().bytes(), 8);
        assert_eq!(ty.align().bytes(), 8);

        let target32 = Target::new(Arch::RiscV32, Os::None, ObjectFormat::Binary, Endian::Little);
        let module = module_for(target32);
        let (_, ty) = type_by_name(&module, "C@long").unwrap();
        assert_eq!(ty.kind, TyKind::Int { bits: 32 });
        assert_eq!(ty.size().bytes(), 4);
    }

    #[test]
    fn bool_is_a_one_bit_unsigned() {
        let module = module_for(Target::host());
        let (_, ty) = type_by_name(&module, "C@bool").unwrap();
        assert_eq!(ty.kind, TyKind::Uint { bits: 1 });
        assert_eq!(ty.size().bytes(), 1);
    }

    #[test]
    fn floats_are_ieee_754() {
        let module = module_for(Target::host());
        let (_, single) = type_by_name(&module, "C@float").unwrap();
        assert_eq!(single.kind, TyKind::Float { mantissa: 23, exponent: 8 });
        assert_eq!(single.size().bytes(), 4);

        let (_, double) = type_by_name(&module, "C@double").unwrap();
        assert_eq!(double.kind, TyKind::Float { mantissa: 52, exponent: 11 });
        assert_eq!(double.size().bytes(), 8);
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let module = module_for(Target::host());
        assert!(type_by_name(&module, "C@wchar_t").is_none());
        assert!(type_by_name(&module, "int").is_none());
    }

    #[test]
    fn unsupported_word_sizes_are_rejected() {
        let target = Target::new(Arch::Uxn, Os::None, ObjectFormat::UxnRom, Endian::Little);
        let config = BuildConfig {
            target,
            ..BuildConfig::default()
        };
        let mut module = Module::new("uxn", config);
        assert!(matches!(
            register_types(&mut module),
            Err(Error::BadArgument(_))
        ));
    }
}
