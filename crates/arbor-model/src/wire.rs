//! Serde helpers for the scalar/list wire contract.
//!
//! Reference-collection fields accept a single value or a list on input and
//! are always held as an ordered `Vec` internally. On output a one-element
//! vec collapses back to a scalar, an empty vec is omitted entirely (via
//! `skip_serializing_if`) and anything longer serializes as a list. The
//! transform round-trips losslessly.
//!
//! Use with `#[serde(default, with = "arbor_model::wire::one_or_many",
//! skip_serializing_if = "Vec::is_empty")]`.

pub mod one_or_many {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match values {
            [single] => single.serialize(serializer),
            many => many.serialize(serializer),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany<T> {
            Many(Vec<T>),
            One(T),
        }

        match Option::<OneOrMany<T>>::deserialize(deserializer)? {
            None => Ok(Vec::new()),
            Some(OneOrMany::Many(values)) => Ok(values),
            Some(OneOrMany::One(value)) => Ok(vec![value]),
        }
    }
}
