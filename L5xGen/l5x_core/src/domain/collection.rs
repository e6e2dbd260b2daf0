use std::collections::HashMap;

use crate::domain::meta::TreeObject;

/// Insertion-ordered collection with unique names.
#[derive(Debug, Clone)]
pub struct NamedList<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for NamedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: TreeObject> NamedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.name().to_string(), i))
            .collect();
    }

    /// Adds `item`. An item with the same name is replaced: in place when `index` is `None`,
    /// otherwise it is removed and the new item lands at `index` (clamped to the length).
    pub fn add(&mut self, item: T, index: Option<usize>) {
        let existing = self.index.get(item.name()).copied();
        match (existing, index) {
            (Some(pos), None) => self.items[pos] = item,
            (existing, Some(index)) => {
                if let Some(pos) = existing {
                    self.items.remove(pos);
                }
                let index = index.min(self.items.len());
                self.items.insert(index, item);
            }
            (None, None) => self.items.push(item),
        }
        self.reindex();
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        let pos = self.index.get(name).copied()?;
        let item = self.items.remove(pos);
        self.reindex();
        Some(item)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        match self.index.get(name) {
            Some(&i) => self.items.get_mut(i),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Renaming an item in place would stale the index; call after `set_name`.
    pub fn refresh(&mut self) {
        self.reindex();
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.name()).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: TreeObject> FromIterator<T> for NamedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = NamedList::new();
        for item in iter {
            list.add(item, None);
        }
        list
    }
}

impl<'a, T> IntoIterator for &'a NamedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
