//! List registered job handlers.

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::App;
use crate::output;

#[derive(Debug, Serialize, Tabled)]
struct HandlerRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Key")]
    key: String,
}

pub fn execute(app: &App) -> Result<()> {
    let registry = app.registry();

    let rows: Vec<HandlerRow> = registry
        .targets()
        .into_iter()
        .flat_map(|target| {
            registry.methods(target).into_iter().map(move |method| HandlerRow {
                target: target.to_string(),
                method: method.to_string(),
                key: format!("{}@{}", target, method),
            })
        })
        .collect();

    output::print_list(&rows, app.format);
    Ok(())
}
