//! Code for handling IDs
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};

/// A trait alias for ID types
pub trait IDLike:
    Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}
impl<T> IDLike for T where
    T: Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `BusID`, `GeneratorID`, etc.)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }
        }
    };
}
pub(crate) use define_id_type;

#[cfg(test)]
define_id_type!(GenericID);

/// Indicates that the struct has an ID field
pub trait HasID<ID: IDLike> {
    /// Get the struct's ID
    fn get_id(&self) -> &ID;
}

/// Implement the `HasID` trait for the given type, assuming it has a field called `id`
macro_rules! define_id_getter {
    ($t:ty, $id_ty:ty) => {
        impl crate::id::HasID<$id_ty> for $t {
            fn get_id(&self) -> &$id_ty {
                &self.id
            }
        }
    };
}
pub(crate) use define_id_getter;

/// A data structure containing a set of IDs
pub trait IDCollection<ID: IDLike> {
    /// Check if the ID is in the collection, returning a copy of it if found.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID to check
    ///
    /// # Returns
    ///
    /// A copy of the ID in `self`, or an error if not found.
    fn get_id(&self, id: &ID) -> Result<ID>;
}

impl<ID: IDLike> IDCollection<ID> for IndexSet<ID> {
    fn get_id(&self, id: &ID) -> Result<ID> {
        let found = self
            .get(id.borrow())
            .with_context(|| format!("Unknown ID {id} found"))?;
        Ok(found.clone())
    }
}

impl<ID: IDLike, T> IDCollection<ID> for IndexMap<ID, T> {
    fn get_id(&self, id: &ID) -> Result<ID> {
        let (found, _) = self
            .get_key_value(id.borrow())
            .with_context(|| format!("Unknown ID {id} found"))?;
        Ok(found.clone())
    }
}

/// A map from IDs to network elements which can be queried with a useful error message
pub trait ElementMap<ID: IDLike, T> {
    /// Look up an element by ID, failing if it is absent.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID to look up
    /// * `kind` - Human-readable name of the element kind, used in the error message
    fn get_element(&self, id: &ID, kind: &str) -> Result<&T>;
}

impl<ID: IDLike, T> ElementMap<ID, T> for IndexMap<ID, T> {
    fn get_element(&self, id: &ID, kind: &str) -> Result<&T> {
        self.get(id.borrow())
            .with_context(|| format!("Unknown {kind} {id} found"))
    }
}
