//! Object heap and static field storage.

use std::collections::{BTreeMap, HashMap};

use crate::{
    analysis::Token,
    emulation::value::{ObservedObject, ObservedValue, Value},
    Error, Result,
};

/// A heap allocated object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapObject {
    /// A class instance. Fields that were never written read as zero.
    Instance {
        /// Allocated class.
        class: Token,
        /// Written fields.
        fields: BTreeMap<Token, Value>,
    },
    /// A zero-initialized array.
    Array(Vec<Value>),
}

/// Simulated heap with a bound on the number of objects.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
    statics: BTreeMap<Token, Value>,
    max_objects: usize,
}

impl Heap {
    /// Creates an empty heap holding at most `max_objects` objects.
    #[must_use]
    pub fn new(max_objects: usize) -> Self {
        Self {
            objects: Vec::new(),
            statics: BTreeMap::new(),
            max_objects,
        }
    }

    /// Returns the number of allocated objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing was allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn push(&mut self, object: HeapObject) -> Result<Value> {
        if self.objects.len() >= self.max_objects {
            return Err(Error::Interpreter(format!(
                "heap object limit of {} exceeded",
                self.max_objects
            )));
        }
        self.objects.push(object);
        Ok(Value::Ref(self.objects.len() - 1))
    }

    /// Allocates an instance of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] when the object limit is reached.
    pub fn alloc_instance(&mut self, class: Token) -> Result<Value> {
        self.push(HeapObject::Instance {
            class,
            fields: BTreeMap::new(),
        })
    }

    /// Allocates a zeroed array of `length` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] for a negative length or when the object
    /// limit is reached.
    pub fn alloc_array(&mut self, length: i64) -> Result<Value> {
        let length = usize::try_from(length)
            .map_err(|_| Error::Interpreter(format!("negative array length {length}")))?;
        self.push(HeapObject::Array(vec![Value::ZERO; length]))
    }

    fn object(&self, reference: Value) -> Result<&HeapObject> {
        match reference {
            Value::Ref(id) => self
                .objects
                .get(id)
                .ok_or_else(|| Error::Interpreter(format!("dangling reference @{id}"))),
            Value::Null => Err(Error::Interpreter("null dereference".to_string())),
            other => Err(Error::Interpreter(format!("{other} is not a reference"))),
        }
    }

    fn object_mut(&mut self, reference: Value) -> Result<&mut HeapObject> {
        match reference {
            Value::Ref(id) => self
                .objects
                .get_mut(id)
                .ok_or_else(|| Error::Interpreter(format!("dangling reference @{id}"))),
            Value::Null => Err(Error::Interpreter("null dereference".to_string())),
            other => Err(Error::Interpreter(format!("{other} is not a reference"))),
        }
    }

    /// Reads an instance field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] if `object` is not an instance.
    pub fn load_field(&self, object: Value, field: Token) -> Result<Value> {
        match self.object(object)? {
            HeapObject::Instance { fields, .. } => {
                Ok(fields.get(&field).copied().unwrap_or(Value::ZERO))
            }
            HeapObject::Array(_) => Err(Error::Interpreter("field access on array".to_string())),
        }
    }

    /// Writes an instance field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] if `object` is not an instance.
    pub fn store_field(&mut self, object: Value, field: Token, value: Value) -> Result<()> {
        match self.object_mut(object)? {
            HeapObject::Instance { fields, .. } => {
                fields.insert(field, value);
                Ok(())
            }
            HeapObject::Array(_) => Err(Error::Interpreter("field access on array".to_string())),
        }
    }

    fn element_index(elements: &[Value], index: Value) -> Result<usize> {
        index
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < elements.len())
            .ok_or_else(|| {
                Error::Interpreter(format!(
                    "index {index} out of bounds for length {}",
                    elements.len()
                ))
            })
    }

    /// Reads an array element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] if `array` is not an array or the index
    /// is out of bounds.
    pub fn load_element(&self, array: Value, index: Value) -> Result<Value> {
        match self.object(array)? {
            HeapObject::Array(elements) => Ok(elements[Self::element_index(elements, index)?]),
            HeapObject::Instance { .. } => {
                Err(Error::Interpreter("element access on instance".to_string()))
            }
        }
    }

    /// Writes an array element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interpreter`] if `array` is not an array or the index
    /// is out of bounds.
    pub fn store_element(&mut self, array: Value, index: Value, value: Value) -> Result<()> {
        match self.object_mut(array)? {
            HeapObject::Array(elements) => {
                let slot = Self::element_index(elements, index)?;
                elements[slot] = value;
                Ok(())
            }
            HeapObject::Instance { .. } => {
                Err(Error::Interpreter("element access on instance".to_string()))
            }
        }
    }

    /// Reads a static field.
    #[must_use]
    pub fn load_static(&self, field: Token) -> Value {
        self.statics.get(&field).copied().unwrap_or(Value::ZERO)
    }

    /// Writes a static field.
    pub fn store_static(&mut self, field: Token, value: Value) {
        self.statics.insert(field, value);
    }

    /// Returns the written static fields.
    #[must_use]
    pub fn statics(&self) -> &BTreeMap<Token, Value> {
        &self.statics
    }

    /// Canonicalizes `roots` and everything reachable from them.
    pub(crate) fn observe(&self, roots: &[Value]) -> (Vec<ObservedValue>, Vec<ObservedObject>) {
        let mut ids: HashMap<usize, usize> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();

        let intern = |value: Value, ids: &mut HashMap<usize, usize>, order: &mut Vec<usize>| {
            match value {
                Value::Int(v) => ObservedValue::Int(v),
                Value::Bool(b) => ObservedValue::Bool(b),
                Value::Null => ObservedValue::Null,
                Value::Ref(id) => {
                    let next = ids.len();
                    let canonical = *ids.entry(id).or_insert_with(|| {
                        order.push(id);
                        next
                    });
                    ObservedValue::Object(canonical)
                }
            }
        };

        let observed_roots: Vec<ObservedValue> = roots
            .iter()
            .map(|root| intern(*root, &mut ids, &mut order))
            .collect();

        let mut objects = Vec::new();
        let mut cursor = 0;
        while let Some(&id) = order.get(cursor) {
            cursor += 1;
            let observed = match self.objects.get(id) {
                Some(HeapObject::Instance { fields, .. }) => ObservedObject::Instance(
                    fields
                        .iter()
                        .filter(|(_, value)| **value != Value::ZERO)
                        .map(|(field, value)| (*field, intern(*value, &mut ids, &mut order)))
                        .collect(),
                ),
                Some(HeapObject::Array(elements)) => ObservedObject::Array(
                    elements
                        .iter()
                        .map(|value| intern(*value, &mut ids, &mut order))
                        .collect(),
                ),
                None => ObservedObject::Array(Vec::new()),
            };
            objects.push(observed);
        }

        (observed_roots, objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(row: u32) -> Token {
        Token::from_parts(Token::FIELD, row)
    }

    #[test]
    fn test_fields_default_to_zero() {
        let mut heap = Heap::new(8);
        let obj = heap
            .alloc_instance(Token::from_parts(Token::CLASS, 1))
            .expect("alloc");
        assert_eq!(heap.load_field(obj, field(1)).ok(), Some(Value::ZERO));
        heap.store_field(obj, field(1), Value::Int(5)).expect("store");
        assert_eq!(heap.load_field(obj, field(1)).ok(), Some(Value::Int(5)));
        assert!(heap.load_field(Value::Null, field(1)).is_err());
    }

    #[test]
    fn test_array_bounds() {
        let mut heap = Heap::new(8);
        let arr = heap.alloc_array(2).expect("alloc");
        assert!(heap.store_element(arr, Value::Int(1), Value::Int(3)).is_ok());
        assert_eq!(heap.load_element(arr, Value::Int(1)).ok(), Some(Value::Int(3)));
        assert!(heap.load_element(arr, Value::Int(2)).is_err());
        assert!(heap.alloc_array(-1).is_err());
    }

    #[test]
    fn test_object_limit() {
        let mut heap = Heap::new(1);
        assert!(heap.alloc_array(0).is_ok());
        assert!(heap.alloc_array(0).is_err());
    }

    #[test]
    fn test_observation_ignores_allocation_ids() {
        let class = Token::from_parts(Token::CLASS, 1);

        let mut first = Heap::new(8);
        let a = first.alloc_instance(class).expect("alloc");
        first.store_field(a, field(1), Value::Int(1)).expect("store");

        let mut second = Heap::new(8);
        let _unused = second.alloc_instance(class).expect("alloc");
        let b = second.alloc_instance(class).expect("alloc");
        second.store_field(b, field(1), Value::Int(1)).expect("store");

        assert_eq!(first.observe(&[a]), second.observe(&[b]));
    }
}
