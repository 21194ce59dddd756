// component.rs - Runtime component registration
//
// Components are identified by ComponentTypeId (the integer value of an
// application-defined enum), not by Rust TypeIds. The registry is built
// once at startup and then shared read-only.

use crate::ecs::storage::{Column, ErasedColumn};
use crate::ecs::EcsError;
use fnv::FnvHashMap;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::mem::{align_of, size_of};

/// Upper bound on component type ids; the registry is a dense table.
pub const MAX_COMPONENT_TYPES: usize = 1024;

/// Identifier for a component kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(pub u32);

impl ComponentTypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for ComponentTypeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Anything storable as a component.
///
/// Components are plain Rust values owned by the `EntityStore`; they must be
/// `Send + Sync` so storage can be iterated in parallel.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

pub(crate) type BoxedComponent = Box<dyn Any + Send + Sync>;
type ConstructFn = fn() -> BoxedComponent;
type ColumnFactory = fn() -> Box<dyn ErasedColumn>;

/// Metadata record for a registered component type.
#[derive(Clone)]
pub struct ComponentMeta {
    pub id: ComponentTypeId,
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub rust_type: TypeId,
    pub rust_type_name: &'static str,
    construct: ConstructFn,
    new_column: ColumnFactory,
}

impl ComponentMeta {
    /// Build a default-constructed value of this component type.
    pub fn construct(&self) -> Box<dyn Any + Send + Sync> {
        (self.construct)()
    }

    pub(crate) fn new_column(&self) -> Box<dyn ErasedColumn> {
        (self.new_column)()
    }
}

impl fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .field("rust_type", &self.rust_type_name)
            .finish()
    }
}

fn construct_default<T: Component + Default>() -> BoxedComponent {
    Box::new(T::default())
}

fn column_of<T: Component>() -> Box<dyn ErasedColumn> {
    Box::new(Column::<T>::new())
}

/// Table of component metadata indexed by `ComponentTypeId`.
///
/// Registration is write-once per id: registering the same id (or the same
/// Rust type) twice is a programmer error and panics. Wrap the finished
/// registry in an `Arc` and hand it to every `EntityStore`.
#[derive(Default)]
pub struct ComponentRegistry {
    by_id: Vec<Option<ComponentMeta>>,
    by_name: FnvHashMap<String, ComponentTypeId>,
    by_type: FnvHashMap<TypeId, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `type_id` to `T`, its default constructor and a display name.
    ///
    /// # Panics
    /// If `type_id` or `T` is already registered, or `type_id` is out of range.
    pub fn register<T: Component + Default>(
        &mut self,
        type_id: impl Into<ComponentTypeId>,
        name: &str,
    ) -> &mut Self {
        let id = type_id.into();
        assert!(
            id.index() < MAX_COMPONENT_TYPES,
            "component type id {id} exceeds the limit of {MAX_COMPONENT_TYPES}"
        );
        if let Some(existing) = self.get(id) {
            panic!(
                "component type id {id} registered twice: already `{}`, now `{name}`",
                existing.name
            );
        }
        if let Some(existing) = self.by_type.get(&TypeId::of::<T>()) {
            panic!(
                "rust type `{}` registered twice: already as {existing}, now as {id}",
                type_name::<T>()
            );
        }
        assert!(
            !self.by_name.contains_key(name),
            "component name `{name}` registered twice"
        );

        if self.by_id.len() <= id.index() {
            self.by_id.resize_with(id.index() + 1, || None);
        }
        self.by_id[id.index()] = Some(ComponentMeta {
            id,
            name: name.to_string(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            rust_type: TypeId::of::<T>(),
            rust_type_name: type_name::<T>(),
            construct: construct_default::<T>,
            new_column: column_of::<T>,
        });
        self.by_name.insert(name.to_string(), id);
        self.by_type.insert(TypeId::of::<T>(), id);

        tracing::debug!(%id, name, size = size_of::<T>(), "registered component");
        self
    }

    /// Look up component metadata by id.
    pub fn get(&self, type_id: ComponentTypeId) -> Option<&ComponentMeta> {
        self.by_id.get(type_id.index()).and_then(Option::as_ref)
    }

    pub fn meta(&self, type_id: ComponentTypeId) -> Result<&ComponentMeta, EcsError> {
        self.get(type_id).ok_or(EcsError::Unregistered(type_id))
    }

    pub fn name_of(&self, type_id: ComponentTypeId) -> Result<&str, EcsError> {
        self.meta(type_id).map(|meta| meta.name.as_str())
    }

    pub fn size_of(&self, type_id: ComponentTypeId) -> Result<usize, EcsError> {
        self.meta(type_id).map(|meta| meta.size)
    }

    /// Reverse reflection: display name back to id.
    pub fn id_of_name(&self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EcsError::UnknownName(name.to_string()))
    }

    /// Id under which the Rust type `T` was registered.
    pub fn id_of<T: Component>(&self) -> Result<ComponentTypeId, EcsError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(EcsError::UnregisteredType {
                type_name: type_name::<T>(),
            })
    }

    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.get(type_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Registered records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentMeta> {
        self.by_id.iter().flatten()
    }
}

/// Declare a component-kind enum with name reflection.
///
/// Generates a `#[repr(u32)]` enum plus `ALL`, `name()`, `from_name()` and a
/// conversion into [`ComponentTypeId`].
///
/// # Example
/// ```ignore
/// component_kinds! {
///     pub enum Kind {
///         Position = 0,
///         Velocity = 1,
///     }
/// }
///
/// registry.register::<Position>(Kind::Position, Kind::Position.name());
/// ```
#[macro_export]
macro_rules! component_kinds {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u32)]
        $vis enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for $crate::ecs::ComponentTypeId {
            fn from(kind: $name) -> Self {
                $crate::ecs::ComponentTypeId(kind as u32)
            }
        }
    };
}
