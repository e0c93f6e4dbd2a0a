use thiserror::Error;

#[derive(Debug, Error)]
pub enum WranglerError {
    #[error("parse error in {source_name} at line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("undefined entity '&{0};'")]
    UndefinedEntity(String),

    #[error("navigation to zone {zone} failed")]
    Navigation { zone: u32 },

    #[error("interaction with actor {actor} for objective {objective} timed out")]
    InteractionTimeout { actor: u32, objective: u32 },

    #[error("order for item {item} x{amount} failed: {reason}")]
    Order {
        item: u32,
        amount: u32,
        reason: String,
    },

    #[error("unlock of {class} failed at step '{step}': {reason}")]
    UnlockStep {
        class: String,
        step: String,
        reason: String,
    },

    #[error("order runner request rejected: {0}")]
    Runner(String),

    #[error("class change to {class} was not confirmed")]
    ClassSwitch { class: String },

    #[error("cancelled")]
    Cancelled,

    #[error("invalid tables: {0}")]
    InvalidTables(String),

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("include depth {depth} exceeds limit {limit}: {path}")]
    IncludeDepth {
        path: String,
        depth: usize,
        limit: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl WranglerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, WranglerError>;
