// store.rs - Entity storage with per-type component columns

use crate::ecs::component::ComponentRegistry;
use crate::ecs::entity::EntitySlot;
use crate::ecs::storage::{Column, ErasedColumn};
use crate::ecs::{Component, ComponentTypeId, EcsError, Entity};
use crate::hash::{HashKey, HashKeyBuilder};
use bytemuck::NoUninit;
use fnv::FnvHashMap;
use std::any::type_name;
use std::sync::Arc;

/// Sparse collection of entities and their components.
///
/// All mutation happens through `&mut self`, so the store can only be
/// changed from the thread that owns it, and never while one of its
/// iterators is alive. Callers that need to mutate based on a query should
/// collect first, then apply.
pub struct EntityStore {
    registry: Arc<ComponentRegistry>,
    slots: Vec<EntitySlot>,
    free: Vec<u32>,
    live: usize,
    columns: FnvHashMap<ComponentTypeId, Box<dyn ErasedColumn>>,
}

impl EntityStore {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            columns: FnvHashMap::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Allocate a fresh entity.
    ///
    /// Freed slots are reused only after their generation was bumped by
    /// `destroy`, so old handles to the slot never match again.
    pub fn create(&mut self) -> Entity {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            return Entity::new(index, slot.generation);
        }
        assert!(self.slots.len() < u32::MAX as usize, "entity index space exhausted");
        let index = self.slots.len() as u32;
        self.slots.push(EntitySlot {
            generation: 0,
            alive: true,
        });
        Entity::new(index, 0)
    }

    /// Remove all components of `entity` and invalidate the handle.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.validate(entity)?;
        for column in self.columns.values_mut() {
            column.remove(entity.index());
        }
        let slot = &mut self.slots[entity.index() as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        // A slot whose generation wrapped around is retired for good.
        if slot.generation != 0 {
            self.free.push(entity.index());
        }
        self.live -= 1;
        tracing::trace!(%entity, "destroyed entity");
        Ok(())
    }

    /// Destroy every live entity.
    ///
    /// Columns are emptied wholesale; every live slot has its generation
    /// bumped exactly as `destroy` would.
    pub fn clear(&mut self) {
        for column in self.columns.values_mut() {
            column.clear();
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.alive {
                continue;
            }
            slot.alive = false;
            slot.generation = slot.generation.wrapping_add(1);
            if slot.generation != 0 {
                self.free.push(index as u32);
            }
        }
        tracing::trace!(destroyed = self.live, "cleared entity store");
        self.live = 0;
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.validate(entity).is_ok()
    }

    fn validate(&self, entity: Entity) -> Result<(), EcsError> {
        match self.slots.get(entity.index() as usize) {
            Some(slot) if slot.alive && slot.generation == entity.generation() => Ok(()),
            _ => Err(EcsError::InvalidEntity(entity)),
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity::new(index as u32, slot.generation))
    }

    fn column<T: Component>(&self) -> Result<Option<&Column<T>>, EcsError> {
        let id = self.registry.id_of::<T>()?;
        match self.columns.get(&id) {
            None => Ok(None),
            Some(column) => column
                .as_any()
                .downcast_ref::<Column<T>>()
                .map(Some)
                .ok_or_else(|| self.mismatch::<T>(id)),
        }
    }

    fn column_mut<T: Component>(&mut self) -> Result<Option<&mut Column<T>>, EcsError> {
        let id = self.registry.id_of::<T>()?;
        let mismatch = self.mismatch::<T>(id);
        match self.columns.get_mut(&id) {
            None => Ok(None),
            Some(column) => column
                .as_any_mut()
                .downcast_mut::<Column<T>>()
                .map(Some)
                .ok_or(mismatch),
        }
    }

    fn column_or_insert<T: Component>(&mut self) -> Result<&mut Column<T>, EcsError> {
        let id = self.registry.id_of::<T>()?;
        let mismatch = self.mismatch::<T>(id);
        let meta = self.registry.meta(id)?;
        self.columns
            .entry(id)
            .or_insert_with(|| meta.new_column())
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(mismatch)
    }

    fn mismatch<T: Component>(&self, id: ComponentTypeId) -> EcsError {
        EcsError::TypeMismatch {
            id,
            expected: self
                .registry
                .get(id)
                .map(|meta| meta.rust_type_name)
                .unwrap_or("<unregistered>"),
            actual: type_name::<T>(),
        }
    }

    /// Insert or replace the `T` component of `entity`, returning the old value.
    pub fn attach<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<Option<T>, EcsError> {
        self.validate(entity)?;
        Ok(self.column_or_insert::<T>()?.insert(entity, value))
    }

    /// Attach a default-constructed component, knowing only its id.
    pub fn attach_default(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<(), EcsError> {
        self.validate(entity)?;
        let meta = self.registry.meta(type_id)?;
        let value = meta.construct();
        let column = self
            .columns
            .entry(type_id)
            .or_insert_with(|| meta.new_column());
        column
            .insert_boxed(entity, value)
            .map_err(|_| EcsError::TypeMismatch {
                id: type_id,
                expected: meta.rust_type_name,
                actual: "<boxed default>",
            })
    }

    /// Remove the `T` component of `entity`. Absent components are not an error.
    pub fn detach<T: Component>(&mut self, entity: Entity) -> Result<Option<T>, EcsError> {
        self.validate(entity)?;
        Ok(self
            .column_mut::<T>()?
            .and_then(|column| column.take(entity.index())))
    }

    /// Type-erased `detach`; returns whether a component was removed.
    pub fn detach_id(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<bool, EcsError> {
        self.validate(entity)?;
        self.registry.meta(type_id)?;
        Ok(self
            .columns
            .get_mut(&type_id)
            .is_some_and(|column| column.remove(entity.index())))
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Result<Option<&T>, EcsError> {
        self.validate(entity)?;
        Ok(self
            .column::<T>()?
            .and_then(|column| column.get(entity.index())))
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<Option<&mut T>, EcsError> {
        self.validate(entity)?;
        Ok(self
            .column_mut::<T>()?
            .and_then(|column| column.get_mut(entity.index())))
    }

    pub fn has(&self, entity: Entity, type_id: ComponentTypeId) -> Result<bool, EcsError> {
        self.validate(entity)?;
        self.registry.meta(type_id)?;
        Ok(self
            .columns
            .get(&type_id)
            .is_some_and(|column| column.contains(entity.index())))
    }

    /// Every `(entity, &T)` pair, in storage order.
    pub fn iter<T: Component>(&self) -> Result<impl Iterator<Item = (Entity, &T)> + '_, EcsError> {
        let column = self.column::<T>()?;
        Ok(column.into_iter().flat_map(|column| column.iter()))
    }

    pub fn iter_mut<T: Component>(
        &mut self,
    ) -> Result<impl Iterator<Item = (Entity, &mut T)> + '_, EcsError> {
        let column = self.column_mut::<T>()?;
        Ok(column.into_iter().flat_map(|column| column.iter_mut()))
    }

    /// Entities holding a component of `type_id`, in storage order.
    pub fn entities_with(
        &self,
        type_id: ComponentTypeId,
    ) -> Result<impl Iterator<Item = Entity> + '_, EcsError> {
        self.registry.meta(type_id)?;
        let owners = self
            .columns
            .get(&type_id)
            .map(|column| column.owners())
            .unwrap_or(&[]);
        Ok(owners.iter().copied())
    }

    /// Number of `T` components stored.
    pub fn count<T: Component>(&self) -> Result<usize, EcsError> {
        Ok(self.column::<T>()?.map_or(0, |column| column.values().len()))
    }

    /// Mutate every `T` in parallel. Runs on the rayon pool but returns only
    /// once all rows are done, so the store is still owned by one thread.
    pub fn par_for_each_mut<T, F>(&mut self, f: F) -> Result<(), EcsError>
    where
        T: Component,
        F: Fn(Entity, &mut T) + Sync + Send,
    {
        if let Some(column) = self.column_mut::<T>()? {
            column.par_for_each_mut(f);
        }
        Ok(())
    }

    /// Write `A` while reading `B` for every entity that holds both.
    ///
    /// # Panics
    /// If `A` and `B` are the same component type.
    pub fn join_mut<A, B, F>(&mut self, mut f: F) -> Result<(), EcsError>
    where
        A: Component,
        B: Component,
        F: FnMut(Entity, &mut A, &B),
    {
        let id_a = self.registry.id_of::<A>()?;
        let id_b = self.registry.id_of::<B>()?;
        assert_ne!(id_a, id_b, "join_mut needs two distinct component types");

        // Lift B out so A can be borrowed mutably alongside it.
        let Some(erased_b) = self.columns.remove(&id_b) else {
            return Ok(());
        };
        let result = match erased_b.as_any().downcast_ref::<Column<B>>() {
            None => Err(self.mismatch::<B>(id_b)),
            Some(column_b) => self.column_mut::<A>().map(|column_a| {
                for (entity, a) in column_a.into_iter().flat_map(|c| c.iter_mut()) {
                    if let Some(b) = column_b.get(entity.index()) {
                        f(entity, a, b);
                    }
                }
            }),
        };
        self.columns.insert(id_b, erased_b);
        result
    }

    /// Key over every `T` (and its owner) in storage order.
    ///
    /// Two stores that ran the same deterministic simulation produce the same key.
    pub fn content_hash<T: Component + NoUninit>(&self) -> Result<HashKey, EcsError> {
        let mut builder = HashKeyBuilder::new();
        if let Some(column) = self.column::<T>()? {
            for (owner, value) in column.owners().iter().zip(column.values()) {
                builder.write_value(&owner.to_bits()).write_value(value);
            }
        }
        Ok(builder.finish())
    }

    /// Display names of the components `entity` holds, in id order.
    pub fn component_names(&self, entity: Entity) -> Result<Vec<&str>, EcsError> {
        self.validate(entity)?;
        Ok(self
            .registry
            .iter()
            .filter(|meta| {
                self.columns
                    .get(&meta.id)
                    .is_some_and(|column| column.contains(entity.index()))
            })
            .map(|meta| meta.name.as_str())
            .collect())
    }
}
