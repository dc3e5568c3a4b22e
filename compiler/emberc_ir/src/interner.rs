//! The module name table: interned, NUL-terminated strings addressed by
//! byte offset.

use crate::error::Error;
use emberc_utils::newtype_idx;

newtype_idx! {
    /// A byte offset into a module's [`NameTable`].
    ///
    /// Offset 0 is reserved for the leading NUL and means "no name"; it
    /// never resolves to a string.
    pub struct NameRef;
}

/// The absent name.
pub const NO_NAME: NameRef = NameRef::from_usize(0);

impl NameRef {
    #[inline]
    pub fn is_absent(&self) -> bool {
        *self == NO_NAME
    }
}

/// A contiguous byte buffer of NUL-terminated strings.
///
/// Interning appends; nothing is ever removed or moved, so a [`NameRef`]
/// stays valid for the lifetime of the table. Identical strings interned
/// twice get two distinct offsets with equal content; the table does not
/// deduplicate.
#[derive(Debug, Clone)]
pub struct NameTable {
    bytes: Vec<u8>,
}

impl NameTable {
    pub fn new() -> Self {
        // The leading NUL keeps offset 0 free for NO_NAME.
        NameTable { bytes: vec![0] }
    }

    /// Appends `name` plus a terminating NUL and returns the offset at
    /// which `name` begins.
    pub fn intern(&mut self, name: &str) -> Result<NameRef, Error> {
        if name.as_bytes().contains(&0) {
            return Err(Error::BadArgument(
                "name contains an embedded NUL byte".to_string(),
            ));
        }

        let offset = NameRef::from_usize(self.bytes.len());
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        Ok(offset)
    }

    /// Resolves a [`NameRef`] back to the interned string.
    ///
    /// Returns `None` for [`NO_NAME`] and for offsets outside the table.
    pub fn get(&self, name: NameRef) -> Option<&str> {
        use emberc_utils::idx::Idx;

        let start = name.idx();
        if start == 0 || start >= self.bytes.len() {
            return None;
        }

        let rest = &self.bytes[start..];
        let end = rest.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&rest[..end]).ok()
    }

    /// The total size of the table in bytes, including terminators.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The seed NUL is always present.
        self.bytes.len() <= 1
    }
}

impl Default for NameTable {
    fn default() -> Self {
        NameTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_round_trips() {
        let mut table = NameTable::new();
        let alpha = table.intern("alpha").unwrap();
        let beta = table.intern("beta").unwrap();
        let alpha2 = table.intern("alpha").unwrap();

        assert_eq!(table.get(alpha), Some("alpha"));
        assert_eq!(table.get(beta), Some("beta"));
        assert_eq!(table.get(alpha2), Some("alpha"));
        // No deduplication: same content, distinct offsets.
        assert_ne!(alpha, alpha2);
    }

    #[test]
    fn offset_zero_is_the_absent_name() {
        let mut table = NameTable::new();
        table.intern("something").unwrap();
        assert_eq!(table.get(NO_NAME), None);
        assert!(NO_NAME.is_absent());
    }

    #[test]
    fn out_of_range_offsets_resolve_to_none() {
        let table = NameTable::new();
        assert_eq!(table.get(NameRef::from_usize(100)), None);
    }

    #[test]
    fn embedded_nul_is_rejected() {
        let mut table = NameTable::new();
        assert!(matches!(
            table.intern("bad\0name"),
            Err(Error::BadArgument(_))
        ));
    }

    #[test]
    fn empty_table_reports_empty() {
        let mut table = NameTable::new();
        assert!(table.is_empty());
        table.intern("x").unwrap();
        assert!(!table.is_empty());
    }
}
