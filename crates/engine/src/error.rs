/// Errors surfaced by engine construction and runtime setters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("culling distance {requested} rejected, must be finite and at least {minimum}")]
    InvalidCullingDistance { requested: f32, minimum: f32 },
}
