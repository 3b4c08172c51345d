use core::any::TypeId;
use core::cmp::Ordering;

use super::any::AnySharedPtr;
use super::ptr::SharedPtr;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct ElementType {
    id: TypeId,
    name: &'static str,
}

/// An ordered, growable array of shared pointers.
///
/// Adding a pointer stores one live reference; removing or overwriting it
/// hands that reference back or drops it.
///
/// Slots are not individually atomic: there is no per-slot compare-and-swap,
/// and every mutation needs `&mut self`. Share the array behind a mutex
/// when several threads edit it. Readers holding `&SharedPtrArray` can
/// clone pointers out concurrently.
///
/// An array made with [`of`](Self::of) only accepts one value type.
#[derive(Debug, Clone, Default)]
pub struct SharedPtrArray {
    items: Vec<AnySharedPtr>,
    element: Option<ElementType>,
}

impl SharedPtrArray {
    /// An empty array accepting any value type.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty array accepting only `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            items: Vec::new(),
            element: Some(ElementType {
                id: TypeId::of::<T>(),
                name: core::any::type_name::<T>(),
            }),
        }
    }

    /// Number of pointers held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check(&self, ptr: &AnySharedPtr) -> Result<()> {
        match self.element {
            Some(element) if element.id != ptr.managed_type() => Err(Error::TypeMismatch {
                expected: element.name,
                found: ptr.type_name(),
            }),
            _ => Ok(()),
        }
    }

    fn check_index(&self, index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }

    /// Appends a pointer.
    pub fn add(&mut self, ptr: AnySharedPtr) -> Result<()> {
        self.check(&ptr)?;
        self.items.push(ptr);
        Ok(())
    }

    /// Appends a typed pointer.
    pub fn add_shared<T: Send + Sync + 'static>(&mut self, ptr: SharedPtr<T>) -> Result<()> {
        self.add(SharedPtr::into_any(ptr))
    }

    /// Inserts at `index`, shifting later pointers up. `index == len` appends.
    pub fn insert(&mut self, index: usize, ptr: AnySharedPtr) -> Result<()> {
        self.check_index(index, self.items.len() + 1)?;
        self.check(&ptr)?;
        self.items.insert(index, ptr);
        Ok(())
    }

    /// Overwrites the pointer at `index`, returning the previous one.
    pub fn put(&mut self, index: usize, ptr: AnySharedPtr) -> Result<AnySharedPtr> {
        self.check_index(index, self.items.len())?;
        self.check(&ptr)?;
        Ok(core::mem::replace(&mut self.items[index], ptr))
    }

    /// Removes and returns the pointer at `index`.
    pub fn remove(&mut self, index: usize) -> Result<AnySharedPtr> {
        self.check_index(index, self.items.len())?;
        Ok(self.items.remove(index))
    }

    /// The pointer at `index`.
    pub fn get(&self, index: usize) -> Option<&AnySharedPtr> {
        self.items.get(index)
    }

    /// A typed live reference to the pointer at `index`.
    pub fn get_as<T: Send + Sync + 'static>(&self, index: usize) -> Result<SharedPtr<T>> {
        let ptr = self.items.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.items.len(),
        })?;
        ptr.clone().downcast::<T>().map_err(|ptr| Error::TypeMismatch {
            expected: core::any::type_name::<T>(),
            found: ptr.type_name(),
        })
    }

    /// Exchanges two slots.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.check_index(a, self.items.len())?;
        self.check_index(b, self.items.len())?;
        self.items.swap(a, b);
        Ok(())
    }

    /// Sorts with an exchange sort. Arrays are expected to be small.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&AnySharedPtr, &AnySharedPtr) -> Ordering,
    {
        let len = self.items.len();
        for i in 0..len {
            for j in (i + 1)..len {
                if compare(&self.items[i], &self.items[j]) == Ordering::Greater {
                    self.items.swap(i, j);
                }
            }
        }
    }

    /// Drops every pointer.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterates in order.
    pub fn iter(&self) -> core::slice::Iter<'_, AnySharedPtr> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a SharedPtrArray {
    type Item = &'a AnySharedPtr;
    type IntoIter = core::slice::Iter<'a, AnySharedPtr>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
