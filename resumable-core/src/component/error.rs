use thiserror::Error;

use crate::reactive::ComputationError;

/// Writes to component state that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("component has no state entry `{key}`")]
    UnknownKey { key: String },

    #[error("state entry `{key}` is not a signal and cannot be written")]
    ReadOnly { key: String },
}

/// Disagreement between serialized hydration data and the component
/// definition. Always recovered from by falling back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationSkew {
    #[error("no state blob for instance `{instance}`")]
    MissingState { instance: String },

    #[error("state blob for instance `{instance}` is malformed: {message}")]
    MalformedState { instance: String, message: String },

    #[error("state blob for instance `{instance}` has unknown key `{key}`")]
    UnknownKey { instance: String, key: String },

    #[error("no content blob for instance `{instance}`")]
    MissingContent { instance: String },

    #[error("content blob for instance `{instance}` is malformed: {message}")]
    MalformedContent { instance: String, message: String },
}

/// Failures while mounting a component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("component `{component}` has no view")]
    MissingView { component: String },

    /// The view or a computed entry failed on its first run.
    #[error(transparent)]
    Computation(#[from] ComputationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    #[error("failed to mount instance `{instance}` of `{component}`")]
    Mount {
        component: String,
        instance: String,
        #[source]
        source: MountError,
    },
}
