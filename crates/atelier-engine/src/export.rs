use crate::error::{EngineError, EngineResult};
use crate::purchases::PurchaseSummary;

const HEADER: [&str; 4] = ["Famille", "Référence", "Total ML", "Total PA"];

fn amount(value: f64) -> String {
    format!("{value:.2}")
}

/// Purchase report as `;`-separated CSV: one line per group (fabrics, then linings, then
/// rails), meters and buy cost with two decimals, cost left blank when zero.
pub fn export_purchases_csv(summary: &PurchaseSummary) -> EngineResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for group in summary.groups() {
        let cost = if group.total_cost == 0.0 {
            String::new()
        } else {
            amount(group.total_cost)
        };
        writer.write_record([
            group.kind.as_str(),
            group.label.as_str(),
            amount(group.total_linear_meters).as_str(),
            cost.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| EngineError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| EngineError::Export(err.to_string()))
}
