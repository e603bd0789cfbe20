//! Closed-set polymorphic payloads
//!
//! A [`OneOf`] holds at most one value out of a fixed, ordered list of
//! candidate shapes. On the wire only the populated shape is written, with its
//! fields at the top level; an empty `OneOf` is written as `{}`.
//!
//! Decoding picks a shape in two passes. A candidate that declares a
//! discriminant (for example `type == "ref/prompt"` or
//! `method == "tools/list"`) is selected as soon as the object carries that
//! value. Otherwise candidates are tried in declaration order against their
//! required fields, and the first one that matches and fully decodes wins.
//! Anything else is rejected with [`PayloadError::NoMatchingVariant`].
//!
//! Union enums are declared with the crate-internal `one_of!` macro, which
//! also generates per-variant getters and setters on `OneOf<Union>`.

use schemars::JsonSchema;
use serde::de::{ DeserializeOwned, Error as _ };
use serde::{ Deserialize, Deserializer, Serialize, Serializer };
use serde_json::{ Map, Value };
use thiserror::Error;

/// Reasons a payload could not be decoded into a union
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("{union} payload must be a JSON object")]
    NotAnObject { union: &'static str },

    #[error("payload does not match any {union} variant")]
    NoMatchingVariant { union: &'static str },

    #[error("payload tagged as {union}::{variant} is invalid: {reason}")]
    InvalidVariant {
        union: &'static str,
        variant: &'static str,
        reason: String,
    },
}

/// JSON kind a required field must have for a structural match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl Kind {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Integer => value.is_i64() || value.is_u64(),
            Kind::Number => value.is_number(),
            Kind::Boolean => value.is_boolean(),
            Kind::Array => value.is_array(),
            Kind::Object => value.is_object(),
            Kind::Any => true,
        }
    }
}

/// A concrete payload shape that can be a candidate of a union
pub trait Shape: Serialize + DeserializeOwned {
    /// Field and value that identify this shape on their own
    const DISCRIMINANT: Option<(&'static str, &'static str)> = None;

    /// Fields that must be present, with the kind each must have
    const REQUIRED: &'static [(&'static str, Kind)] = &[];

    /// Whether the object carries this shape's discriminant value
    fn has_discriminant(obj: &Map<String, Value>) -> bool {
        match Self::DISCRIMINANT {
            Some((field, tag)) => obj.get(field).and_then(Value::as_str) == Some(tag),
            None => false,
        }
    }

    /// Structural validator used by the ordered pass
    fn matches(obj: &Map<String, Value>) -> bool {
        if Self::DISCRIMINANT.is_some() && !Self::has_discriminant(obj) {
            return false;
        }
        Self::REQUIRED
            .iter()
            .all(|(field, kind)| obj.get(*field).is_some_and(|v| kind.accepts(v)))
    }
}

/// The enum side of a union, normally generated by `one_of!`
pub trait Variants: Sized + Clone + PartialEq + Serialize {
    /// Name used in error messages
    const UNION: &'static str;

    /// Select and decode the matching candidate
    fn decode(obj: &Map<String, Value>) -> Result<Self, PayloadError>;

    /// Whether any candidate claims the object through its discriminant
    fn recognizes(obj: &Map<String, Value>) -> bool;

    /// Name of the populated variant
    fn variant_name(&self) -> &'static str;
}

/// Decode one candidate from an object already selected for it
pub fn decode_candidate<T: Shape>(
    obj: &Map<String, Value>,
    union: &'static str,
    variant: &'static str
) -> Result<T, PayloadError> {
    serde_json::from_value(Value::Object(obj.clone())).map_err(|e| PayloadError::InvalidVariant {
        union,
        variant,
        reason: e.to_string(),
    })
}

/// At most one populated variant of the union `V`
#[derive(Debug, Clone, PartialEq)]
pub struct OneOf<V> {
    value: Option<V>,
}

impl<V> Default for OneOf<V> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<V: Variants> OneOf<V> {
    /// An empty union; encodes as `{}`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(value: impl Into<V>) -> Self {
        Self { value: Some(value.into()) }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn get(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_inner(self) -> Option<V> {
        self.value
    }

    /// Populate a variant; whatever was set before is cleared
    pub fn set(&mut self, value: impl Into<V>) {
        self.value = Some(value.into());
    }

    pub fn take(&mut self) -> Option<V> {
        self.value.take()
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    /// Name of the populated variant, if any
    pub fn variant_name(&self) -> Option<&'static str> {
        self.value.as_ref().map(Variants::variant_name)
    }

    /// Decode from any JSON value
    pub fn decode(value: &Value) -> Result<Self, PayloadError> {
        match value {
            Value::Object(obj) => Self::decode_object(obj),
            _ => Err(PayloadError::NotAnObject { union: V::UNION }),
        }
    }

    pub fn decode_object(obj: &Map<String, Value>) -> Result<Self, PayloadError> {
        V::decode(obj).map(|value| Self { value: Some(value) })
    }

    /// Encode to a JSON value; the empty union becomes `{}`
    pub fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl<V: Variants> From<V> for OneOf<V> {
    fn from(value: V) -> Self {
        Self { value: Some(value) }
    }
}

impl<V: Serialize> Serialize for OneOf<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.value {
            Some(value) => value.serialize(serializer),
            None => Map::new().serialize(serializer),
        }
    }
}

impl<'de, V: Variants> Deserialize<'de> for OneOf<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value).map_err(D::Error::custom)
    }
}

impl<V: JsonSchema> JsonSchema for OneOf<V> {
    fn schema_name() -> String {
        V::schema_name()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        V::json_schema(generator)
    }
}

/// Declare a union enum and its `OneOf` accessors.
///
/// ```ignore
/// one_of! {
///     pub enum Content {
///         Text(TextContent) => text / set_text,
///         Image(ImageContent) => image / set_image,
///     }
/// }
/// ```
macro_rules! one_of {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident($ty:ty) => $getter:ident / $setter:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, ::schemars::JsonSchema)]
        #[serde(untagged)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant($ty), )+
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self {
                    $( $name::$variant(value) => value.serialize(serializer), )+
                }
            }
        }

        impl $crate::protocol::one_of::Variants for $name {
            const UNION: &'static str = stringify!($name);

            fn decode(
                obj: &::serde_json::Map<String, ::serde_json::Value>
            ) -> Result<Self, $crate::protocol::one_of::PayloadError> {
                use $crate::protocol::one_of::{ decode_candidate, Shape };

                $(
                    if <$ty as Shape>::has_discriminant(obj) {
                        return decode_candidate::<$ty>(obj, Self::UNION, stringify!($variant))
                            .map($name::$variant);
                    }
                )+

                $(
                    if <$ty as Shape>::matches(obj) {
                        match decode_candidate::<$ty>(obj, Self::UNION, stringify!($variant)) {
                            Ok(value) => return Ok($name::$variant(value)),
                            Err(e) => ::tracing::trace!("{} candidate rejected: {}", stringify!($variant), e),
                        }
                    }
                )+

                Err($crate::protocol::one_of::PayloadError::NoMatchingVariant { union: Self::UNION })
            }

            fn recognizes(obj: &::serde_json::Map<String, ::serde_json::Value>) -> bool {
                use $crate::protocol::one_of::Shape;
                false $( || <$ty as Shape>::has_discriminant(obj) )+
            }

            fn variant_name(&self) -> &'static str {
                match self {
                    $( $name::$variant(_) => stringify!($variant), )+
                }
            }
        }

        $(
            impl From<$ty> for $name {
                fn from(value: $ty) -> Self {
                    $name::$variant(value)
                }
            }
        )+

        impl $crate::protocol::one_of::OneOf<$name> {
            $(
                pub fn $getter(&self) -> Option<&$ty> {
                    match self.get() {
                        Some($name::$variant(value)) => Some(value),
                        _ => None,
                    }
                }

                pub fn $setter(&mut self, value: $ty) {
                    self.set($name::$variant(value));
                }
            )+
        }
    };
}

pub(crate) use one_of;

/// Implement [`Shape`] for a payload struct.
///
/// `impl_shape!(T [ "type" = "text" ] { "text": String })` gives `T` a
/// discriminant and required fields; either part may be left out.
macro_rules! impl_shape {
    ($ty:ty [ $field:literal = $tag:literal ] $({ $($req:literal : $kind:ident),* $(,)? })?) => {
        impl $crate::protocol::one_of::Shape for $ty {
            const DISCRIMINANT: Option<(&'static str, &'static str)> = Some(($field, $tag));
            $(
                const REQUIRED: &'static [(&'static str, $crate::protocol::one_of::Kind)] =
                    &[$(($req, $crate::protocol::one_of::Kind::$kind)),*];
            )?
        }
    };
    ($ty:ty { $($req:literal : $kind:ident),* $(,)? }) => {
        impl $crate::protocol::one_of::Shape for $ty {
            const REQUIRED: &'static [(&'static str, $crate::protocol::one_of::Kind)] =
                &[$(($req, $crate::protocol::one_of::Kind::$kind)),*];
        }
    };
}

pub(crate) use impl_shape;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
    struct Circle {
        radius: f64,
    }
    impl_shape!(Circle { "radius": Number });

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
    struct Square {
        side: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    }
    impl_shape!(Square { "side": Integer });

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
    struct Tagged {
        kind: String,
        side: i64,
    }
    impl_shape!(Tagged [ "kind" = "tagged" ] { "side": Integer });

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
    struct Anything {}
    impl_shape!(Anything {});

    one_of! {
        enum Figure {
            Circle(Circle) => circle / set_circle,
            Square(Square) => square / set_square,
            Tagged(Tagged) => tagged / set_tagged,
        }
    }

    one_of! {
        enum Loose {
            Square(Square) => square / set_square,
            Anything(Anything) => anything / set_anything,
        }
    }

    #[test]
    fn setters_clear_other_variants() {
        let mut figure = OneOf::<Figure>::empty();
        figure.set_circle(Circle { radius: 1.0 });
        figure.set_square(Square { side: 2, label: None });

        assert!(figure.circle().is_none());
        assert_eq!(figure.square().map(|s| s.side), Some(2));
        assert_eq!(figure.variant_name(), Some("Square"));
    }

    #[test]
    fn empty_encodes_as_empty_object() {
        assert_eq!(OneOf::<Figure>::empty().encode().unwrap(), json!({}));
    }

    #[test]
    fn populated_variant_is_flattened() {
        let figure = OneOf::<Figure>::new(Square { side: 3, label: Some("s".into()) });
        assert_eq!(figure.encode().unwrap(), json!({ "side": 3, "label": "s" }));
    }

    #[test]
    fn discriminant_wins_over_declaration_order() {
        // Square would also match structurally and comes first.
        let figure = OneOf::<Figure>::decode(&json!({ "kind": "tagged", "side": 4 })).unwrap();
        assert_eq!(figure.tagged().map(|t| t.side), Some(4));
        assert!(figure.square().is_none());
    }

    #[test]
    fn wrong_discriminant_value_does_not_match() {
        let figure = OneOf::<Figure>::decode(&json!({ "kind": "other", "side": 4 })).unwrap();
        assert!(figure.square().is_some());
    }

    #[test]
    fn tagged_but_invalid_payload_is_reported() {
        let err = OneOf::<Figure>::decode(&json!({ "kind": "tagged" })).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidVariant { variant: "Tagged", .. }));
    }

    #[test]
    fn declaration_order_breaks_structural_ties() {
        let loose = OneOf::<Loose>::decode(&json!({ "side": 1 })).unwrap();
        assert!(loose.square().is_some());

        let loose = OneOf::<Loose>::decode(&json!({ "radius": 1.0 })).unwrap();
        assert!(loose.anything().is_some());
    }

    #[test]
    fn required_field_kinds_are_checked() {
        let err = OneOf::<Figure>::decode(&json!({ "side": "wide" })).unwrap_err();
        assert_eq!(err, PayloadError::NoMatchingVariant { union: "Figure" });

        let figure = OneOf::<Figure>::decode(&json!({ "radius": 2 })).unwrap();
        assert!(figure.circle().is_some());
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert_eq!(
            OneOf::<Figure>::decode(&json!({})).unwrap_err(),
            PayloadError::NoMatchingVariant { union: "Figure" }
        );
        assert_eq!(
            OneOf::<Figure>::decode(&json!("circle")).unwrap_err(),
            PayloadError::NotAnObject { union: "Figure" }
        );
    }

    #[test]
    fn equality_compares_the_populated_variant() {
        let a = OneOf::<Figure>::new(Circle { radius: 1.0 });
        let b: OneOf<Figure> = serde_json::from_value(json!({ "radius": 1.0 })).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, OneOf::<Figure>::empty());
    }

    #[test]
    fn recognizes_only_discriminated_candidates() {
        let tagged = json!({ "kind": "tagged", "side": 1 });
        let plain = json!({ "side": 1 });
        assert!(Figure::recognizes(tagged.as_object().unwrap()));
        assert!(!Figure::recognizes(plain.as_object().unwrap()));
    }
}
