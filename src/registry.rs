//! A data structure for keeping track of a stable mapping between namespaced
//! string names, numerical IDs and objects. Used for the biome palette.

use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::num::NonZeroU32;

use bytemuck::{PodInOption, TransparentWrapper, ZeroableInOption};
use hashbrown::{Equivalent, HashMap};
use kstring::{KString, KStringRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Checks if the given name is a valid registry name (`[a-z0-9_]+`).
pub const fn is_valid_registry_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' | b'a'..=b'z' | b'_' => {}
            _ => return false,
        }
        i += 1;
    }
    true
}

/// Simple namespaced registry object name.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct RegistryName {
    /// The namespace.
    pub ns: KString,
    /// The object name, unique in the namespace.
    pub key: KString,
}

/// Reference to a [`RegistryName`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct RegistryNameRef<'n> {
    /// The namespace.
    pub ns: KStringRef<'n>,
    /// The object name, unique in the namespace.
    pub key: KStringRef<'n>,
}

impl RegistryName {
    /// Constructs a name out of the given namespace and key.
    pub fn new(ns: &str, key: &str) -> Self {
        Self {
            ns: KString::from_ref(ns),
            key: KString::from_ref(key),
        }
    }

    /// Converts the name to a reference struct.
    pub fn as_ref(&self) -> RegistryNameRef {
        self.into()
    }
}

impl<'a> From<&'a RegistryName> for RegistryNameRef<'a> {
    fn from(value: &'a RegistryName) -> Self {
        RegistryNameRef {
            ns: value.ns.as_ref(),
            key: value.key.as_ref(),
        }
    }
}

impl<'a> Equivalent<RegistryName> for RegistryNameRef<'a> {
    fn equivalent(&self, key: &RegistryName) -> bool {
        key.as_ref() == *self
    }
}

impl Display for RegistryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ns, self.key)
    }
}

impl<'a> Display for RegistryNameRef<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ns, self.key)
    }
}

/// Newtype wrapper around a `u32` registry ID. `NonZeroU32` gives
/// `Option<RegistryId>` the same layout as `u32`, which is what lets a
/// fragment cell store "no biome assigned yet" for free.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, TransparentWrapper)]
pub struct RegistryId(pub NonZeroU32);

// SAFETY: transparent NonZeroU32 wrapper, NonZeroU32 implements this trait.
unsafe impl ZeroableInOption for RegistryId {}
// SAFETY: transparent NonZeroU32 wrapper, NonZeroU32 implements this trait.
unsafe impl PodInOption for RegistryId {}

impl Display for RegistryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Needs to be implemented on any object that can be a part of a [`Registry`].
pub trait RegistryObject: PartialEq + Hash {
    /// Should be trivial.
    fn registry_name(&self) -> RegistryNameRef;
}

/// Possible errors from [`Registry`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name given is not made of legal registry keys.
    #[error("Name {name} is not a legal registry name (made of `[a-z0-9_]+` namespace and key)")]
    IllegalName {
        /// The name that contains an invalid registry key.
        name: RegistryName,
    },
    /// A name that is already present in the registry was prevented from being overwritten.
    #[error("Name {name} already exists in the registry")]
    NameAlreadyExists {
        /// The conflicting name.
        name: RegistryName,
    },
    /// No more unallocated space in the registry.
    #[error("No free space in the registry")]
    NoFreeSpace,
}

/// A registry of up to 2^32-2 named objects, each allocated a stable [`RegistryId`].
#[derive(Serialize, Deserialize)]
pub struct Registry<Object: RegistryObject> {
    next_free_id: NonZeroU32,
    id_to_obj: Vec<Option<Object>>,
    name_to_id: HashMap<RegistryName, RegistryId>,
}

impl<Object: RegistryObject> Default for Registry<Object> {
    fn default() -> Self {
        Self {
            next_free_id: NonZeroU32::new(1).unwrap(),
            id_to_obj: vec![None],
            name_to_id: HashMap::with_capacity(64),
        }
    }
}

impl<Object: RegistryObject> Registry<Object> {
    /// Low-level: allocate the next free ID in the registry.
    pub fn allocate_id(&mut self) -> Result<RegistryId, RegistryError> {
        let id = self.next_free_id;
        self.next_free_id = self.next_free_id.checked_add(1).ok_or(RegistryError::NoFreeSpace)?;
        Ok(RegistryId(id))
    }

    /// Try to put the object in the registry, allocating it a new ID.
    ///
    /// On failure, no ID is allocated and a precise error is returned.
    pub fn push_object(&mut self, object: Object) -> Result<RegistryId, RegistryError> {
        let name = RegistryName::from(&object.registry_name());
        if !is_valid_registry_name(&name.ns) || !is_valid_registry_name(&name.key) {
            return Err(RegistryError::IllegalName { name });
        }
        if self.name_to_id.contains_key(&name) {
            return Err(RegistryError::NameAlreadyExists { name });
        }
        let id = self.allocate_id()?;
        let raw_id = id.0.get() as usize;
        if self.id_to_obj.len() <= raw_id {
            self.id_to_obj.resize_with(raw_id + 32, || None);
        }
        self.id_to_obj[raw_id] = Some(object);
        self.name_to_id.insert(name, id);
        Ok(id)
    }

    /// Given a namespaced name, look up an object and its ID, or return `None` if it's not found.
    pub fn lookup_name_to_object(&self, name: RegistryNameRef) -> Option<(RegistryId, &Object)> {
        let id = *self.name_to_id.get(&name)?;
        let obj = self.id_to_obj.get(id.0.get() as usize)?.as_ref()?;
        Some((id, obj))
    }

    /// Given a registry object ID, look up an object, or return `None` if it's not found.
    pub fn lookup_id_to_object(&self, id: RegistryId) -> Option<&Object> {
        self.id_to_obj.get(id.0.get() as usize)?.as_ref()
    }

    /// Iterates over all the registry objects.
    pub fn iter(&self) -> impl Iterator<Item = (RegistryId, RegistryNameRef, &Object)> {
        self.name_to_id.iter().filter_map(|(name, &id)| {
            self.id_to_obj
                .get(id.0.get() as usize)
                .and_then(Option::as_ref)
                .map(|obj| (id, name.as_ref(), obj))
        })
    }
}

impl<'a> From<&'a RegistryNameRef<'a>> for RegistryName {
    fn from(value: &'a RegistryNameRef<'a>) -> Self {
        RegistryName {
            ns: value.ns.into(),
            key: value.key.into(),
        }
    }
}
