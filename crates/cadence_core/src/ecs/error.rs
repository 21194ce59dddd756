use crate::ecs::{ComponentTypeId, Entity};
use thiserror::Error;

/// Recoverable ECS failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    #[error("entity {0} is invalid: destroyed or never created")]
    InvalidEntity(Entity),

    #[error("component type {0} is not registered")]
    Unregistered(ComponentTypeId),

    #[error("rust type `{type_name}` is not registered as a component")]
    UnregisteredType { type_name: &'static str },

    #[error("component type {id} stores `{expected}`, not `{actual}`")]
    TypeMismatch {
        id: ComponentTypeId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("no component type is named `{0}`")]
    UnknownName(String),
}
