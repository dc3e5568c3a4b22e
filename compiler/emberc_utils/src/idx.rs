pub trait Idx: 'static + Copy + Eq + PartialEq {
    fn new(idx: usize) -> Self;
    fn idx(&self) -> usize;
    fn incr(&mut self);
    fn incr_by(&mut self, by: usize);
}

/// Defines a newtype index over `usize` together with its [`Idx`] impl.
///
/// The IR reference types (`TypeRef`, `FuncRef`, ...) are all declared
/// through this macro so that every reference kind gets the same
/// representation and the same trait surface.
#[macro_export]
macro_rules! newtype_idx {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        $vis struct $name(usize);

        impl $name {
            #[inline]
            $vis const fn from_usize(idx: usize) -> Self {
                $name(idx)
            }
        }

        impl $crate::idx::Idx for $name {
            #[inline]
            fn new(idx: usize) -> Self {
                $name(idx)
            }

            #[inline]
            fn idx(&self) -> usize {
                self.0
            }

            fn incr(&mut self) {
                self.0 += 1;
            }

            fn incr_by(&mut self, by: usize) {
                self.0 += by;
            }
        }
    };
}
