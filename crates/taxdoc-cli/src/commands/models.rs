//! Models command - check OCR model files and the language model runtime.

use std::fs;

use clap::{Args, Subcommand};
use console::style;

use taxdoc_core::OllamaClient;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Check OCR model files and the language model
    Status,

    /// List models pulled into the language model runtime
    List,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    match args.command {
        ModelsCommand::Status => check_status(&config).await,
        ModelsCommand::List => list_models(&config).await,
    }
}

async fn check_status(config: &taxdoc_core::TaxdocConfig) -> anyhow::Result<()> {
    println!("{}", style("OCR Models").bold());
    println!("Model directory: {}", config.engine.model_dir.display());

    let mut all_present = true;
    for path in config.engine.model_paths() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (status, size_str) = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => (style("✓").green(), format_size(metadata.len())),
            _ => {
                all_present = false;
                (style("✗").red(), "missing".to_string())
            }
        };
        println!("    {} {:<25} {:>10}", status, name, size_str);
    }

    if all_present {
        println!("    {} Ready", style("✓").green());
    } else if config.engine.ocr_enabled {
        println!(
            "    {} Place the models in the directory above, or disable OCR with --no-ocr",
            style("⚠").yellow()
        );
    } else {
        println!("    {} OCR disabled in config", style("ℹ").blue());
    }

    println!();
    println!("{}", style("Language Model").bold());
    println!("Endpoint: {}", config.llm.endpoint);

    let client = match OllamaClient::new(config.llm.clone()) {
        Ok(client) => client,
        Err(e) => {
            println!("    {} {}", style("✗").red(), e);
            return Ok(());
        }
    };

    if !client.is_available().await {
        println!("    {} Runtime not reachable", style("✗").red());
        return Ok(());
    }
    println!("    {} Runtime reachable", style("✓").green());

    if client.has_model().await? {
        println!(
            "    {} Model {} available",
            style("✓").green(),
            style(&config.llm.model).cyan()
        );
    } else {
        println!(
            "    {} Model {} not pulled. Run 'ollama pull {}'",
            style("⚠").yellow(),
            style(&config.llm.model).cyan(),
            config.llm.model
        );
    }

    Ok(())
}

async fn list_models(config: &taxdoc_core::TaxdocConfig) -> anyhow::Result<()> {
    let client = OllamaClient::new(config.llm.clone())?;
    let models = client.list_models().await?;

    if models.is_empty() {
        println!("{} No models pulled.", style("ℹ").blue());
        return Ok(());
    }

    for model in models {
        let marker = if model == config.llm.model
            || model.strip_suffix(":latest") == Some(config.llm.model.as_str())
        {
            style(" ◀ configured").green().to_string()
        } else {
            String::new()
        };
        println!("{}{}", model, marker);
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2_500), "2.5KB");
        assert_eq!(format_size(9_800_000), "9.8MB");
        assert_eq!(format_size(1_200_000_000), "1.2GB");
    }
}
