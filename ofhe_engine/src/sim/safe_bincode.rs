use bincode::{DefaultOptions, Options};
use serde::Deserialize;

use super::SimResult;

/// Get the largest valid encoding of a type for safe bincode deserialization.
pub(super) trait GetSize {
    /// The largest encoding a valid object can have.
    fn get_size() -> usize;

    /// Check if a decoded object is one the engine could have produced.
    fn check_is_valid(&self) -> SimResult<()>;
}

/// Safely deserialize the given buffer given a type
pub(super) fn deserialize<'a, T: GetSize + Deserialize<'a>>(data: &'a [u8]) -> SimResult<T> {
    let options = DefaultOptions::new()
        .with_limit(T::get_size() as u64)
        .with_fixint_encoding()
        .allow_trailing_bytes();

    let mut deserializer = bincode::Deserializer::from_slice(data, options);
    let result = T::deserialize(&mut deserializer)?;
    result.check_is_valid()?;

    Ok(result)
}
