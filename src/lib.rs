#![forbid(unsafe_code)]

pub mod cache;
pub mod cell;
pub mod charset;
pub mod driver;
pub mod enhance;
pub mod error;
pub mod fonts;
pub mod links;
pub mod level1;
pub mod navigation;
pub mod page;
pub mod pdc;
pub mod post_enhance;
pub mod resolver;
pub mod tools;
pub mod triplet;

#[macro_use]
pub mod trace;

#[cfg(test)]
mod test;

pub use cache::PageCache;
pub use driver::{format_page, Level};
pub use error::{FormatError, Result};
pub use page::{Magazine, PageFunction, Pgno, RawPage, Subno};

/// `serde(with = "crate::serde_big_array")` helper for fixed-size arrays
/// longer than serde's built-in derive support (arrays above 32 elements).
/// Encodes/decodes as a tuple of the same length; the element order and
/// values are unchanged.
pub(crate) mod serde_big_array {
    use serde::de::{Error as DeError, SeqAccess, Visitor};
    use serde::ser::SerializeTuple;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub fn serialize<S, T, const N: usize>(data: &[T; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut tup = serializer.serialize_tuple(N)?;
        for item in data {
            tup.serialize_element(item)?;
        }
        tup.end()
    }

    struct BigArrayVisitor<T, const N: usize>(PhantomData<T>);

    impl<'de, T, const N: usize> Visitor<'de> for BigArrayVisitor<T, N>
    where
        T: Deserialize<'de> + Copy + Default,
    {
        type Value = [T; N];

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "an array of length {N}")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = [T::default(); N];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = seq
                    .next_element()?
                    .ok_or_else(|| DeError::invalid_length(i, &self))?;
            }
            Ok(out)
        }
    }

    pub fn deserialize<'de, D, T, const N: usize>(deserializer: D) -> Result<[T; N], D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Copy + Default,
    {
        deserializer.deserialize_tuple(N, BigArrayVisitor(PhantomData))
    }
}

#[macro_export]
macro_rules! flag_to_function {
    ($flag_name:ident $fun_name:ident $comment:literal) => {
        #[doc = $comment]
        pub fn $fun_name(&self) -> bool {
            self.0 & $flag_name != 0
        }
    };
}

#[macro_export]
macro_rules! flags_to_struct {
    ($struct_name:ident, $struct_type:ty, $($flag_name:ident $flag_fun_name:ident $flag_doc:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
        pub struct $struct_name($struct_type);
        impl $struct_name {
            pub fn from_raw(value: $struct_type) -> anyhow::Result<Self> {
                let invalid_bits = value & !(0 $(| $flag_name)*);
                if invalid_bits != 0 {
                    Err(anyhow::anyhow!("Flag {} with invalid bits {invalid_bits:X}", stringify!($struct_name)))
                } else {
                    Ok(Self(value))
                }
            }

            pub fn into_raw(&self) -> $struct_type {
                self.0
            }

            $(
                $crate::flag_to_function!($flag_name $flag_fun_name $flag_doc);
            )*
        }
    }
}
