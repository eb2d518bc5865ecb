pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate column {column} in schema {schema}")]
    DuplicateColumn { schema: String, column: String },
}
