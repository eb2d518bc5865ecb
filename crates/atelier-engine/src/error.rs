use atelier_formula::FormulaError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("formula for {field} is invalid: {source}")]
    Formula {
        field: String,
        #[source]
        source: FormulaError,
    },

    #[error("dependency cycle between formula fields: {}", fields.join(", "))]
    DependencyCycle { fields: Vec<String> },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("export error: {0}")]
    Export(String),
}
