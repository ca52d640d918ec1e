use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::Config;

const CONFIG_TEMPLATE: &str = r#"# scout configuration
#
# Credentials are read from environment variables (or a .env file):
#   AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT, OPENAI_API_VERSION,
#   OPENAI_API_KEY, GROQ_API_KEY, TAVILY_API_KEY, SERPAPI_API_KEY
# Any setting below can also be overridden with SCOUT_<SECTION>__<KEY>,
# e.g. SCOUT_LLM__MODEL=gpt-4o-mini

# ── Language model ───────────────────────────────────────────────
[llm]
provider = "azure"                # azure | openai | groq | compatible
# model = "gpt-4o"
# deployment = "gpt-4o"           # Azure deployment name
temperature = 0.7
# base_url = "http://localhost:11434/v1"   # required for "compatible"

# ── Web search enrichment ────────────────────────────────────────
[search]
strategy = "agent"                # agent | fallback | off
max_iterations = 8
enable_duckduckgo = true

# ── Official site resolution ─────────────────────────────────────
[resolver]
strategy = "scrape"               # scrape | serpapi
# result_selector = "div.tF2Cxc"
# timeout_secs = 15

[extractor]
fetch_timeout_secs = 10

# ── Reports ──────────────────────────────────────────────────────
[report]
docx_template = "ModelTemplate.docx"
# template = "~/.config/scout/report_prompt.txt"
# output_dir = "~/Documents/reports"

[session]
# db_path = "~/.config/scout/sessions.db"
persist = true
"#;

pub fn run() -> Result<()> {
    let config_dir = Config::config_dir()?;
    let config_path = config_dir.join("config.toml");

    // Create directory if needed
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    if config_path.exists() {
        println!("Existing config file found:");
        println!("  {}", config_path.display());
        print!("\nOverwrite? (The existing file will be backed up) [y/N] ");

        // Flush stdout so the prompt appears before reading
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }

        backup_file(&config_path)?;
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Set your keys:     export AZURE_OPENAI_API_KEY=... AZURE_OPENAI_ENDPOINT=...");
    println!("  2. Research a company: scout research \"Acme Corp\"");
    println!("  3. Or start a session: scout");

    Ok(())
}

/// Back up a file to <name>.bak, appending a timestamp if .bak already exists.
fn backup_file(path: &Path) -> Result<()> {
    let mut backup = path.with_extension("toml.bak");

    if backup.exists() {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let name = format!("toml.bak.{}", timestamp);
        backup = path.with_extension(name);
    }

    std::fs::rename(path, &backup)
        .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
    println!("  Backed up to {}", backup.display());

    Ok(())
}
