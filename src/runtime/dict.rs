//! Insertion-ordered map keyed by script values.
//!
//! Storage preserves insertion order (`entries`) while `buckets` accelerates
//! lookup by hash. Bucket collisions are resolved by checking key equality.
//! Sets reuse the same structure with `None` stored as every value.

use rustc_hash::FxHashMap;

use crate::runtime::error::RuntimeError;
use crate::runtime::value::Value;
use crate::stack;

#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    buckets: FxHashMap<u64, Vec<usize>>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: Vec<(Value, Value)>) -> Result<Self, RuntimeError> {
        let mut dict = Self {
            entries: Vec::with_capacity(pairs.len()),
            buckets: FxHashMap::default(),
        };
        for (key, value) in pairs {
            dict.insert(key, value)?;
        }
        Ok(dict)
    }

    pub fn from_keys(keys: Vec<Value>) -> Result<Self, RuntimeError> {
        Self::from_pairs(keys.into_iter().map(|key| (key, Value::None)).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_index(&self, hash: u64, key: &Value) -> Option<usize> {
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|&index| self.entries[index].0.equals(key))
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, RuntimeError> {
        let hash = key.hash_key()?;
        Ok(self
            .find_index(hash, key)
            .map(|index| self.entries[index].1.clone()))
    }

    pub fn contains(&self, key: &Value) -> Result<bool, RuntimeError> {
        let hash = key.hash_key()?;
        Ok(self.find_index(hash, key).is_some())
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        // Hash first, then confirm equality inside the collision bucket so
        // that `True` and `1` alias the same entry.
        let hash = key.hash_key()?;
        if let Some(index) = self.find_index(hash, &key) {
            self.entries[index].1 = value;
            return Ok(());
        }
        let index = self.entries.len();
        self.entries.push((key, value));
        self.buckets.entry(hash).or_default().push(index);
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, RuntimeError> {
        let hash = key.hash_key()?;
        let Some(index) = self.find_index(hash, key) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(index);
        self.reindex();
        Ok(Some(value))
    }

    fn reindex(&mut self) {
        self.buckets.clear();
        for (index, (key, _)) in self.entries.iter().enumerate() {
            // Keys were hashable when inserted.
            if let Ok(hash) = key.hash_key() {
                self.buckets.entry(hash).or_default().push(index);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets.clear();
    }

    /// Empties the dict, handing back its entries in insertion order.
    pub fn take_entries(&mut self) -> Vec<(Value, Value)> {
        self.buckets.clear();
        std::mem::take(&mut self.entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, value)| value.clone()).collect()
    }

    pub fn items(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|(key, value)| Value::tuple(vec![key.clone(), value.clone()]))
            .collect()
    }

    /// Same keys mapped to equal values, ignoring order.
    pub fn equals(&self, other: &Dict) -> bool {
        self.len() == other.len()
            && stack::ensure_sufficient_stack(|| {
                self.entries.iter().all(|(key, value)| {
                    matches!(other.get(key), Ok(Some(found)) if found.equals(value))
                })
            })
    }

    /// Same keys, ignoring values and order.
    pub fn same_keys(&self, other: &Dict) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, _)| matches!(other.contains(key), Ok(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::Dict;
    use crate::runtime::error::RuntimeError;
    use crate::runtime::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn supports_len_get_set_and_order() {
        let mut dict = Dict::from_pairs(vec![
            (Value::str("a"), Value::Int(1)),
            (Value::str("b"), Value::Int(2)),
        ])
        .expect("dict should build");

        assert_eq!(dict.len(), 2);
        assert_eq!(
            dict.get(&Value::str("a")).expect("hashable"),
            Some(Value::Int(1))
        );
        dict.insert(Value::str("a"), Value::Int(7))
            .expect("insert should work");
        dict.insert(Value::Int(3), Value::Int(9))
            .expect("insert should work");
        assert_eq!(dict.len(), 3);
        assert_eq!(
            Value::dict(dict).plain_repr(),
            "{'a': 7, 'b': 2, 3: 9}"
        );
    }

    #[test]
    fn bool_and_int_keys_alias() {
        let mut dict =
            Dict::from_pairs(vec![(Value::Bool(true), Value::Int(1))]).expect("dict should build");
        dict.insert(Value::Int(1), Value::Int(9))
            .expect("insert should work");
        assert_eq!(dict.len(), 1);
        assert_eq!(
            dict.get(&Value::Bool(true)).expect("hashable"),
            Some(Value::Int(9))
        );
    }

    #[test]
    fn remove_keeps_remaining_lookups_valid() {
        let mut dict = Dict::from_keys(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
            .expect("set should build");
        assert_eq!(
            dict.remove(&Value::Int(1)).expect("hashable"),
            Some(Value::None)
        );
        assert!(dict.contains(&Value::Int(3)).expect("hashable"));
        assert_eq!(dict.keys(), vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn rejects_unhashable_keys() {
        let dict = Dict::new();
        let error = dict
            .get(&Value::list(Vec::new()))
            .expect_err("unhashable key should fail");
        assert!(matches!(
            error,
            RuntimeError::Unhashable { type_name } if type_name == "list"
        ));
    }
}
