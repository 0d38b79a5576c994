use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::TypeIdentity;
use crate::error::{CodecError, Result};
use crate::tag::type_tag;

type Constructor<B> = Box<dyn Fn(Value) -> Result<Box<B>> + Send + Sync>;

/// Tag-keyed constructors that rebuild concrete types behind a base type `B`.
///
/// `B` is usually a trait object. Register every concrete type that may be
/// read back through `B`; the registry's [`TypeIdentity`] must match the
/// writer's codec configuration.
///
/// ```
/// use objwire_codec::TypeRegistry;
/// use serde::Deserialize;
///
/// trait Shape {
///     fn area(&self) -> f64;
/// }
///
/// #[derive(Deserialize)]
/// struct Square {
///     side: f64,
/// }
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.side * self.side
///     }
/// }
///
/// let mut shapes = TypeRegistry::<dyn Shape>::new();
/// shapes.register::<Square, _>(|square| Box::new(square));
/// assert!(shapes.contains("Square"));
/// ```
pub struct TypeRegistry<B: ?Sized> {
    constructors: HashMap<String, Constructor<B>>,
    identity: TypeIdentity,
}

impl<B: ?Sized + 'static> TypeRegistry<B> {
    /// Create an empty registry keyed by simple type tags.
    pub fn new() -> Self {
        Self::with_identity(TypeIdentity::Simple)
    }

    /// Create an empty registry keyed by tags of the given identity form.
    pub fn with_identity(identity: TypeIdentity) -> Self {
        Self {
            constructors: HashMap::new(),
            identity,
        }
    }

    /// Register concrete type `C`, converted to `Box<B>` by `build`.
    ///
    /// Registering the same type twice replaces the earlier constructor.
    pub fn register<C, F>(&mut self, build: F) -> &mut Self
    where
        C: DeserializeOwned + 'static,
        F: Fn(C) -> Box<B> + Send + Sync + 'static,
    {
        let tag = type_tag::<C>(self.identity);
        self.register_as::<C, F>(tag, build)
    }

    /// Register `C` under a fixed tag set with
    /// [`CodecConfig::with_tag`](crate::CodecConfig::with_tag).
    pub fn register_as<C, F>(&mut self, tag: impl Into<String>, build: F) -> &mut Self
    where
        C: DeserializeOwned + 'static,
        F: Fn(C) -> Box<B> + Send + Sync + 'static,
    {
        self.constructors.insert(
            tag.into(),
            Box::new(move |value| {
                let concrete: C = serde_json::from_value(value)?;
                Ok(build(concrete))
            }),
        );
        self
    }

    /// Whether a constructor is registered for `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, in no particular order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Identity form the registry's tags use.
    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Build the concrete value registered under `tag`.
    pub fn construct(&self, tag: &str, value: Value) -> Result<Box<B>> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| CodecError::UnknownType(tag.to_string()))?;
        constructor(value)
    }
}

impl<B: ?Sized + 'static> Default for TypeRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ?Sized> fmt::Debug for TypeRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("TypeRegistry")
            .field("identity", &self.identity)
            .field("tags", &tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    trait Animal {
        fn speak(&self) -> String;
    }

    #[derive(Deserialize)]
    struct Dog {
        name: String,
    }

    #[derive(Deserialize)]
    struct Cat {
        lives: u8,
    }

    impl Animal for Dog {
        fn speak(&self) -> String {
            format!("{} says woof", self.name)
        }
    }

    impl Animal for Cat {
        fn speak(&self) -> String {
            format!("meow x{}", self.lives)
        }
    }

    fn animals() -> TypeRegistry<dyn Animal> {
        let mut registry = TypeRegistry::<dyn Animal>::new();
        registry
            .register::<Dog, _>(|dog| Box::new(dog))
            .register::<Cat, _>(|cat| Box::new(cat));
        registry
    }

    #[test]
    fn constructs_registered_types() {
        let registry = animals();

        let dog = registry.construct("Dog", json!({"name": "rex"})).unwrap();
        assert_eq!(dog.speak(), "rex says woof");

        let cat = registry.construct("Cat", json!({"lives": 9})).unwrap();
        assert_eq!(cat.speak(), "meow x9");
    }

    #[test]
    fn unknown_tag_rejected() {
        let err = animals().construct("Cow", json!({})).err().unwrap();
        assert!(matches!(err, CodecError::UnknownType(tag) if tag == "Cow"));
    }

    #[test]
    fn malformed_value_rejected() {
        let err = animals().construct("Dog", json!({"lives": 9})).err().unwrap();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn full_identity_keys_by_path() {
        let mut registry = TypeRegistry::<dyn Animal>::with_identity(TypeIdentity::Full);
        registry.register::<Dog, _>(|dog| Box::new(dog));

        assert!(!registry.contains("Dog"));
        assert!(registry.tags().all(|tag| tag.ends_with("::Dog")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn debug_lists_sorted_tags() {
        let debug = format!("{:?}", animals());
        assert!(debug.contains(r#"tags: ["Cat", "Dog"]"#));
    }
}
