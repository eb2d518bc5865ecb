use atelier_formula::EvalContext;
use atelier_model::{Catalog, IterationSettings, Settings};
use std::collections::HashMap;

/// Read-only inputs of one recomputation batch.
///
/// Built once by the caller and shared by every row of the batch; nothing in it is mutated while
/// rows are recomputed.
#[derive(Clone, Copy, Debug)]
pub struct RecomputeContext<'a> {
    pub catalog: &'a Catalog,
    pub settings: &'a Settings,
    /// Values of `PARAM.<name>` in formulas.
    pub params: Option<&'a HashMap<String, f64>>,
    /// Project revenue, base of commission rows. Commission totals read as `0` without it.
    pub total_revenue: Option<f64>,
    pub iteration: IterationSettings,
}

impl<'a> RecomputeContext<'a> {
    pub fn new(catalog: &'a Catalog, settings: &'a Settings) -> Self {
        Self {
            catalog,
            settings,
            params: None,
            total_revenue: None,
            iteration: IterationSettings::default(),
        }
    }

    pub fn with_params(mut self, params: &'a HashMap<String, f64>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_total_revenue(mut self, total_revenue: f64) -> Self {
        self.total_revenue = Some(total_revenue);
        self
    }

    pub fn with_iteration(mut self, iteration: IterationSettings) -> Self {
        self.iteration = iteration;
        self
    }

    pub(crate) fn eval_context(&self) -> EvalContext<'a> {
        match self.params {
            Some(params) => EvalContext::new(params),
            None => EvalContext::empty(),
        }
    }
}
