//! Fields command - show the document type registry.

use clap::Args;
use console::style;

use taxdoc_core::DocumentType;

/// Arguments for the fields command.
#[derive(Args)]
pub struct FieldsArgs {
    /// Document type to list fields for (all types if omitted)
    doc_type: Option<DocumentType>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: FieldsArgs) -> anyhow::Result<()> {
    let types: Vec<DocumentType> = match args.doc_type {
        Some(t) => vec![t],
        None => DocumentType::ALL.to_vec(),
    };

    if args.json {
        let map: serde_json::Map<String, serde_json::Value> = types
            .iter()
            .map(|t| (t.label().to_string(), serde_json::json!(t.default_fields())))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if args.doc_type.is_none() {
        println!("{}", style("Document Types").bold());
        println!();
        for t in &types {
            println!(
                "  {} {:<18} {}",
                style("▸").cyan(),
                t.label(),
                style(format!("{} fields", t.default_fields().len())).dim()
            );
        }
        println!();
        println!("Run 'taxdoc fields <TYPE>' to list the fields of a type.");
        return Ok(());
    }

    for t in &types {
        if t.default_fields().is_empty() {
            println!(
                "{} {} has no default fields; name them with --field.",
                style("ℹ").blue(),
                t.label()
            );
            continue;
        }
        for field in t.default_fields() {
            println!("{}", field);
        }
    }

    Ok(())
}
