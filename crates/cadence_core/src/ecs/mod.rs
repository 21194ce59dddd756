//! Entity Component System core types.
//!
//! Components are identified by [`ComponentTypeId`], the integer value of an
//! application-defined enum (see [`component_kinds!`](crate::component_kinds)).
//! A [`ComponentRegistry`] maps each id to its name, layout and default
//! constructor; it is filled once at startup and then shared by every
//! [`EntityStore`]. The store keeps one dense column per component type and
//! hands out generation-checked [`Entity`] handles.

mod component;
mod entity;
mod error;
mod storage;
mod store;

pub use component::{
    Component, ComponentMeta, ComponentRegistry, ComponentTypeId, MAX_COMPONENT_TYPES,
};
pub use entity::Entity;
pub use error::EcsError;
pub use store::EntityStore;
