//! Hex (de)serialization for [`Oid`], which git2 leaves without serde support.

use graft_git::Oid;
use serde::{Deserialize, Deserializer, Serializer, de};

pub fn serialize<S: Serializer>(oid: &Oid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&oid.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Oid, D::Error> {
    let hex = String::deserialize(deserializer)?;
    Oid::from_str(&hex).map_err(de::Error::custom)
}

pub mod option {
    use super::{Deserialize, Deserializer, Oid, Serializer, de};

    #[allow(clippy::ref_option)] // signature fixed by serde's `with`
    pub fn serialize<S: Serializer>(oid: &Option<Oid>, serializer: S) -> Result<S::Ok, S::Error> {
        match oid {
            Some(oid) => serializer.serialize_some(&oid.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Oid>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|hex| Oid::from_str(&hex).map_err(de::Error::custom))
            .transpose()
    }
}
