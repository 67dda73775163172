// Leniency helpers for backend payloads
use serde::{Deserialize, Deserializer};

/// Decode JSON `null` as the type's default, the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
