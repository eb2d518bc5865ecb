//! Evaluation order of the formula fields of one row.
//!
//! Edges run from a field to the formula fields it reads. Fields are scheduled with Kahn's
//! algorithm, breaking ties by schema position so independent fields keep their column order.
//! A formula reading its own field is not an edge: it sees the value from before the call.

use crate::error::{EngineError, EngineResult};
use atelier_formula::{normalize_key, Formula};
use atelier_model::Schema;
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationPlan {
    /// Indices of fields that can be evaluated once, in dependency order.
    order: Vec<usize>,
    /// Indices of fields that are part of a cycle or read one, in schema order.
    blocked: Vec<usize>,
    /// Keys of the fields that sit on a cycle.
    cycle: Vec<String>,
}

impl EvaluationPlan {
    /// Plan the evaluation of `fields`, given in schema order.
    pub fn build(fields: &[(&str, &Formula)]) -> Self {
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for (idx, (key, _)) in fields.iter().enumerate() {
            by_key.entry(normalize_key(key)).or_insert(idx);
        }
        // Exact keys win over normalized aliases.
        for (idx, (key, _)) in fields.iter().enumerate() {
            by_key.insert((*key).to_string(), idx);
        }

        let mut depends_on: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); fields.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); fields.len()];
        for (idx, (_, formula)) in fields.iter().enumerate() {
            for reference in formula.references() {
                let Some(&dep) = by_key
                    .get(reference)
                    .or_else(|| by_key.get(&normalize_key(reference)))
                else {
                    continue;
                };
                if dep != idx && depends_on[idx].insert(dep) {
                    dependents[dep].push(idx);
                }
            }
        }

        let mut in_degree: Vec<usize> = depends_on.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = (0..fields.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(fields.len());
        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for &dependent in &dependents[idx] {
                in_degree[dependent] = in_degree[dependent].saturating_sub(1);
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        let blocked: Vec<usize> = (0..fields.len()).filter(|&i| in_degree[i] > 0).collect();
        let cycle = blocked
            .iter()
            .copied()
            .filter(|&start| reaches(start, start, &depends_on, &blocked))
            .map(|idx| fields[idx].0.to_string())
            .collect();

        Self {
            order,
            blocked,
            cycle,
        }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn blocked(&self) -> &[usize] {
        &self.blocked
    }

    pub fn cycle(&self) -> &[String] {
        &self.cycle
    }

    pub fn is_acyclic(&self) -> bool {
        self.blocked.is_empty()
    }
}

/// Whether `target` is reachable from `from` through at least one edge, staying on `blocked`
/// nodes (cycles can only live there).
fn reaches(from: usize, target: usize, depends_on: &[BTreeSet<usize>], blocked: &[usize]) -> bool {
    let mut seen = vec![false; depends_on.len()];
    let mut stack: Vec<usize> = depends_on[from].iter().copied().collect();
    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if seen[node] || blocked.binary_search(&node).is_err() {
            continue;
        }
        seen[node] = true;
        stack.extend(depends_on[node].iter().copied());
    }
    false
}

/// Evaluation order of a schema's default formulas.
///
/// Fails on the first formula that does not parse, or with [`EngineError::DependencyCycle`] when
/// default formulas depend on each other in a cycle, so a caller can reject such a schema up
/// front. Per-row overrides are not considered.
pub fn analyze_schema(schema: &Schema) -> EngineResult<Vec<String>> {
    let mut parsed = Vec::new();
    for column in &schema.columns {
        let Some(source) = column.default_formula() else {
            continue;
        };
        let formula = Formula::parse(source).map_err(|source| EngineError::Formula {
            field: column.key.clone(),
            source,
        })?;
        parsed.push((column.key.as_str(), formula));
    }

    let fields: Vec<(&str, &Formula)> = parsed.iter().map(|(key, f)| (*key, f)).collect();
    let plan = EvaluationPlan::build(&fields);
    if !plan.is_acyclic() {
        return Err(EngineError::DependencyCycle {
            fields: plan.cycle,
        });
    }
    Ok(plan.order.iter().map(|&idx| fields[idx].0.to_string()).collect())
}
