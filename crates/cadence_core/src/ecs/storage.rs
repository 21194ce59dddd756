// storage.rs - Dense per-type component columns
//
// Each component type gets one column: a dense array of values plus the
// owning entity of each value, and a sparse table from entity index to
// dense row. Removal keeps the remaining rows in insertion order.

use crate::ecs::component::BoxedComponent;
use crate::ecs::Entity;
use rayon::prelude::*;
use std::any::Any;

const EMPTY: u32 = u32::MAX;

/// Type-erased view of a column, used where only the `ComponentTypeId` is known.
pub(crate) trait ErasedColumn: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn contains(&self, index: u32) -> bool;
    /// Drop the component held by entity `index`, if any.
    fn remove(&mut self, index: u32) -> bool;
    /// Insert a boxed value; hands the box back if it holds the wrong type.
    fn insert_boxed(&mut self, entity: Entity, value: BoxedComponent)
        -> Result<(), BoxedComponent>;
    fn owners(&self) -> &[Entity];
    /// Drop every component in the column.
    fn clear(&mut self);
}

pub(crate) struct Column<T> {
    dense: Vec<T>,
    owners: Vec<Entity>,
    sparse: Vec<u32>,
}

impl<T: Send + Sync + 'static> Column<T> {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            sparse: Vec::new(),
        }
    }

    #[inline]
    fn row_of(&self, index: u32) -> Option<usize> {
        match self.sparse.get(index as usize) {
            Some(&row) if row != EMPTY => Some(row as usize),
            _ => None,
        }
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        if let Some(row) = self.row_of(entity.index()) {
            self.owners[row] = entity;
            return Some(std::mem::replace(&mut self.dense[row], value));
        }
        let slot = entity.index() as usize;
        if self.sparse.len() <= slot {
            self.sparse.resize(slot + 1, EMPTY);
        }
        self.sparse[slot] = self.dense.len() as u32;
        self.dense.push(value);
        self.owners.push(entity);
        None
    }

    pub fn take(&mut self, index: u32) -> Option<T> {
        let row = self.row_of(index)?;
        self.sparse[index as usize] = EMPTY;
        self.owners.remove(row);
        let value = self.dense.remove(row);
        // Rows after the hole shifted down by one.
        for owner in &self.owners[row..] {
            self.sparse[owner.index() as usize] -= 1;
        }
        Some(value)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.row_of(index).map(|row| &self.dense[row])
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.row_of(index).map(|row| &mut self.dense[row])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }

    pub fn par_for_each_mut<F>(&mut self, f: F)
    where
        F: Fn(Entity, &mut T) + Sync + Send,
    {
        self.dense
            .par_iter_mut()
            .zip(self.owners.par_iter())
            .for_each(|(value, owner)| f(*owner, value));
    }

    pub fn values(&self) -> &[T] {
        &self.dense
    }

    pub fn owners(&self) -> &[Entity] {
        &self.owners
    }
}

impl<T: Send + Sync + 'static> ErasedColumn for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn contains(&self, index: u32) -> bool {
        self.row_of(index).is_some()
    }

    fn remove(&mut self, index: u32) -> bool {
        self.take(index).is_some()
    }

    fn insert_boxed(
        &mut self,
        entity: Entity,
        value: BoxedComponent,
    ) -> Result<(), BoxedComponent> {
        let value = value.downcast::<T>()?;
        self.insert(entity, *value);
        Ok(())
    }

    fn owners(&self) -> &[Entity] {
        &self.owners
    }

    fn clear(&mut self) {
        self.dense.clear();
        self.owners.clear();
        self.sparse.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replace_and_take() {
        let mut column = Column::<u32>::new();
        let a = Entity::new(0, 0);
        let b = Entity::new(5, 0);
        assert_eq!(column.insert(a, 1), None);
        assert_eq!(column.insert(b, 2), None);
        assert_eq!(column.insert(a, 3), Some(1));
        assert_eq!(column.get(0), Some(&3));
        assert_eq!(column.take(0), Some(3));
        assert_eq!(column.get(0), None);
        assert_eq!(column.get(5), Some(&2));
        assert_eq!(column.take(0), None);
    }

    #[test]
    fn removal_keeps_insertion_order() {
        let mut column = Column::<char>::new();
        for (i, c) in ['a', 'b', 'c', 'd'].into_iter().enumerate() {
            column.insert(Entity::new(i as u32, 0), c);
        }
        column.take(1);
        let seen: Vec<_> = column.iter().map(|(e, c)| (e.index(), *c)).collect();
        assert_eq!(seen, [(0, 'a'), (2, 'c'), (3, 'd')]);
        assert_eq!(column.get(3), Some(&'d'));
    }

    #[test]
    fn boxed_insert_checks_type() {
        let mut column = Column::<u32>::new();
        let entity = Entity::new(0, 0);
        assert!(column.insert_boxed(entity, Box::new(7u32)).is_ok());
        assert!(column.insert_boxed(entity, Box::new("seven")).is_err());
        assert_eq!(column.get(0), Some(&7));
    }
}
