//! Structural serialization for `to_equal`
//!
//! Values are serialized to a `serde_json::Value` through an adapter that
//! tracks the current path. Serialization never silently succeeds on bad
//! input: values serde_json rejects (non-string map keys, failing `Serialize`
//! impls), values that reach themselves again through shared pointers, and
//! values nested deeper than [`MAX_DEPTH`] all produce a
//! [`Failure::Serialization`].

use serde::ser::{
    self, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};
use serde_json::Value;
use std::cell::RefCell;

use crate::error::Failure;

/// Maximum nesting accepted for a value
pub const MAX_DEPTH: usize = 1024;

/// Grow the stack when less than this remains
const RED_ZONE: usize = 64 * 1024;

/// Stack space allocated per growth
const STACK_PER_GROWTH: usize = 1024 * 1024;

/// Serialize a value into its structural form
pub fn to_structure<T: Serialize + ?Sized>(value: &T) -> Result<Value, Failure> {
    let path = RefCell::new(Vec::new());
    let walk = Walk {
        depth: 0,
        path: &path,
    };
    serde_json::to_value(Bounded { value, walk })
        .map_err(|e| Failure::Serialization(e.to_string()))
}

/// Render a structural form for failure messages
pub fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// Address and type of every value between the root and the current one
type Path = RefCell<Vec<(usize, &'static str)>>;

#[derive(Clone, Copy)]
struct Walk<'p> {
    depth: usize,
    path: &'p Path,
}

impl<'p> Walk<'p> {
    fn deeper(self) -> Walk<'p> {
        Walk {
            depth: self.depth + 1,
            path: self.path,
        }
    }
}

/// Pops its frame off the path when the value is done
struct Visit<'p> {
    path: &'p Path,
}

impl Drop for Visit<'_> {
    fn drop(&mut self) {
        self.path.borrow_mut().pop();
    }
}

struct Bounded<'a, 'p, T: ?Sized> {
    value: &'a T,
    walk: Walk<'p>,
}

impl<T: Serialize + ?Sized> Bounded<'_, '_, T> {
    fn enter(&self) -> Result<Option<Visit<'_>>, String> {
        if self.walk.depth > MAX_DEPTH {
            return Err(format!("nesting limit of {MAX_DEPTH} levels exceeded"));
        }

        // zero-sized values share addresses without containing each other
        if std::mem::size_of_val(self.value) == 0 {
            return Ok(None);
        }

        let frame = (
            self.value as *const T as *const () as usize,
            std::any::type_name::<T>(),
        );
        let mut path = self.walk.path.borrow_mut();
        if path.contains(&frame) {
            return Err(format!("cyclic reference to {} detected", frame.1));
        }
        path.push(frame);
        Ok(Some(Visit {
            path: self.walk.path,
        }))
    }
}

impl<T: Serialize + ?Sized> Serialize for Bounded<'_, '_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let _visit = self.enter().map_err(<S::Error as ser::Error>::custom)?;
        stacker::maybe_grow(RED_ZONE, STACK_PER_GROWTH, || {
            self.value.serialize(Limiter {
                inner: serializer,
                walk: self.walk,
            })
        })
    }
}

struct Limiter<'p, S> {
    inner: S,
    walk: Walk<'p>,
}

impl<'p, S> Limiter<'p, S> {
    fn nested<'a, T: ?Sized>(&self, value: &'a T) -> Bounded<'a, 'p, T> {
        Bounded {
            value,
            walk: self.walk.deeper(),
        }
    }
}

macro_rules! forward_scalars {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> Result<Self::Ok, Self::Error> {
                self.inner.$method(v)
            }
        )*
    };
}

impl<'p, S: Serializer> Serializer for Limiter<'p, S> {
    type Ok = S::Ok;
    type Error = S::Error;
    type SerializeSeq = Compound<'p, S::SerializeSeq>;
    type SerializeTuple = Compound<'p, S::SerializeTuple>;
    type SerializeTupleStruct = Compound<'p, S::SerializeTupleStruct>;
    type SerializeTupleVariant = Compound<'p, S::SerializeTupleVariant>;
    type SerializeMap = Compound<'p, S::SerializeMap>;
    type SerializeStruct = Compound<'p, S::SerializeStruct>;
    type SerializeStructVariant = Compound<'p, S::SerializeStructVariant>;

    forward_scalars!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    );

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.inner.serialize_none()
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.inner.serialize_unit()
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let nested = self.nested(value);
        self.inner.serialize_some(&nested)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.inner
            .serialize_unit_variant(name, variant_index, variant)
    }

    fn serialize_newtype_struct<T>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let nested = self.nested(value);
        self.inner.serialize_newtype_struct(name, &nested)
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let nested = self.nested(value);
        self.inner
            .serialize_newtype_variant(name, variant_index, variant, &nested)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        let walk = self.walk.deeper();
        let inner = self.inner.serialize_seq(len)?;
        Ok(Compound { inner, walk })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        let walk = self.walk.deeper();
        let inner = self.inner.serialize_tuple(len)?;
        Ok(Compound { inner, walk })
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        let walk = self.walk.deeper();
        let inner = self.inner.serialize_tuple_struct(name, len)?;
        Ok(Compound { inner, walk })
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        let walk = self.walk.deeper();
        let inner = self
            .inner
            .serialize_tuple_variant(name, variant_index, variant, len)?;
        Ok(Compound { inner, walk })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        let walk = self.walk.deeper();
        let inner = self.inner.serialize_map(len)?;
        Ok(Compound { inner, walk })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        let walk = self.walk.deeper();
        let inner = self.inner.serialize_struct(name, len)?;
        Ok(Compound { inner, walk })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        let walk = self.walk.deeper();
        let inner = self
            .inner
            .serialize_struct_variant(name, variant_index, variant, len)?;
        Ok(Compound { inner, walk })
    }

    fn is_human_readable(&self) -> bool {
        self.inner.is_human_readable()
    }
}

/// Compound serializer state; every element is serialized one level deeper
struct Compound<'p, C> {
    inner: C,
    walk: Walk<'p>,
}

impl<'p, C> Compound<'p, C> {
    fn element<'a, T: ?Sized>(&self, value: &'a T) -> Bounded<'a, 'p, T> {
        Bounded {
            value,
            walk: self.walk,
        }
    }
}

impl<C: SerializeSeq> SerializeSeq for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let element = self.element(value);
        self.inner.serialize_element(&element)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTuple> SerializeTuple for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let element = self.element(value);
        self.inner.serialize_element(&element)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTupleStruct> SerializeTupleStruct for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let element = self.element(value);
        self.inner.serialize_field(&element)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTupleVariant> SerializeTupleVariant for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let element = self.element(value);
        self.inner.serialize_field(&element)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.inner.end()
    }
}

impl<C: SerializeMap> SerializeMap for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let key = self.element(key);
        self.inner.serialize_key(&key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let value = self.element(value);
        self.inner.serialize_value(&value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.inner.end()
    }
}

impl<C: SerializeStruct> SerializeStruct for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let value = self.element(value);
        self.inner.serialize_field(key, &value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.inner.end()
    }
}

impl<C: SerializeStructVariant> SerializeStructVariant for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let value = self.element(value);
        self.inner.serialize_field(key, &value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.inner.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};
    use std::rc::Rc;

    #[derive(Serialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Serialize)]
    struct Node {
        label: &'static str,
        next: RefCell<Option<Rc<Node>>>,
    }

    #[test]
    fn test_nested_containers() {
        let mut map = BTreeMap::new();
        map.insert("points", vec![Point { x: 1, y: 2 }, Point { x: 3, y: 4 }]);

        let value = to_structure(&map).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "points": [{ "x": 1, "y": 2 }, { "x": 3, "y": 4 }] })
        );
    }

    #[test]
    fn test_cycle_fails_closed() {
        let node = Rc::new(Node {
            label: "loop",
            next: RefCell::new(None),
        });
        *node.next.borrow_mut() = Some(Rc::clone(&node));

        let err = to_structure(&node).unwrap_err();
        assert!(err.is_serialization());
        assert!(err.to_string().contains("cyclic"));

        // break the cycle so the test does not leak
        node.next.borrow_mut().take();
    }

    #[test]
    fn test_non_string_keys_fail_closed() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "bytes as key");

        let err = to_structure(&map).unwrap_err();
        assert!(err.is_serialization());
    }

    fn nested_arrays(levels: usize) -> Value {
        let mut value = serde_json::json!(0);
        for _ in 0..levels {
            value = serde_json::json!([value]);
        }
        value
    }

    #[derive(Serialize)]
    struct Link {
        value: usize,
        next: Option<Box<Link>>,
    }

    fn linked_list(len: usize) -> Link {
        let mut head = Link {
            value: len - 1,
            next: None,
        };
        for value in (0..len - 1).rev() {
            head = Link {
                value,
                next: Some(Box::new(head)),
            };
        }
        head
    }

    #[test]
    fn test_nesting_up_to_the_limit_is_accepted() {
        let value = nested_arrays(MAX_DEPTH);
        assert_eq!(to_structure(&value).unwrap(), value);
    }

    #[test]
    fn test_nesting_past_the_limit_is_rejected() {
        let err = to_structure(&nested_arrays(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.is_serialization());
        assert!(err.to_string().contains("nesting limit"));
        assert!(!err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_long_acyclic_list() {
        // each link costs two levels: the option and the struct
        let list = linked_list(MAX_DEPTH / 2);
        let value = to_structure(&list).unwrap();

        let mut cursor = &value;
        let mut seen = 0;
        while !cursor.is_null() {
            assert_eq!(cursor["value"], seen);
            cursor = &cursor["next"];
            seen += 1;
        }
        assert_eq!(seen, MAX_DEPTH / 2);

        let err = to_structure(&linked_list(MAX_DEPTH / 2 + 1)).unwrap_err();
        assert!(err.to_string().contains("nesting limit"));
    }

    #[test]
    fn test_shared_values_are_not_cycles() {
        let shared = Rc::new(Point { x: 1, y: 1 });
        let pair = vec![Rc::clone(&shared), Rc::clone(&shared)];

        let value = to_structure(&(pair, [(), ()])).unwrap();
        assert_eq!(
            value,
            serde_json::json!([[{ "x": 1, "y": 1 }, { "x": 1, "y": 1 }], [null, null]])
        );
    }

    #[test]
    fn test_render() {
        let value = serde_json::json!({ "a": [1, 2] });
        assert_eq!(render(&value), r#"{"a":[1,2]}"#);
    }
}
