/// Result of a get-or-create operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResult<T> {
    /// Resolved value.
    pub value: T,
    /// Whether this call created or changed the value remotely.
    pub created_new: bool,
}

impl<T> UpsertResult<T> {
    /// Wraps a value that already existed.
    #[must_use]
    pub fn existing(value: T) -> Self {
        Self {
            value,
            created_new: false,
        }
    }

    /// Wraps a value written by this call.
    #[must_use]
    pub fn created(value: T) -> Self {
        Self {
            value,
            created_new: true,
        }
    }
}
