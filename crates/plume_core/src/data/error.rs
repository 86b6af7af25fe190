use thiserror::Error;

/// Errors reported by the checked accessors.
///
/// The unchecked hot-path accessors assert instead; "variable not present"
/// is never an error and is reported through `Option`/`bool`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataSetError {
    #[error("buffer has no allocated data")]
    NotAllocated,

    #[error("component {component} out of range ({num_components} components)")]
    ComponentOutOfRange {
        component: usize,
        num_components: usize,
    },

    #[error("instance {instance} out of range ({allocated} allocated)")]
    InstanceOutOfRange { instance: usize, allocated: usize },

    #[error("variable '{name}' is not part of this data set")]
    UnknownVariable { name: String },

    #[error("value does not match type '{expected}'")]
    ValueTypeMismatch { expected: String },
}
