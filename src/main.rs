use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use cardsmith::render::{ImageFormat, Orchestrator};
use cardsmith::tools::Tools;
use cardsmith::RenderConfig;

#[derive(Parser, Debug)]
#[command(name = "cardsmith", version, about = "Render templated cards and markup to images", long_about = None)]
struct Cli {
    /// Serve fonts from this directory instead of the remote font service
    #[arg(long, global = true)]
    font_dir: Option<PathBuf>,

    /// Cache resolved fonts for this many seconds
    #[arg(long, global = true)]
    cache_ttl: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available templates
    List,
    /// Show a template's size, fonts and parameters
    Describe { name: String },
    /// Render a template
    Template {
        name: String,
        /// Template parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Render markup (JSX-like tags or a JSON element descriptor); `-` reads stdin
    Markup {
        markup: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Answer tool calls read as JSON lines on stdin
    Serve,
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Write the image to this path
    #[arg(long, conflicts_with = "blob")]
    out: Option<PathBuf>,
    /// Upload the image to blob storage
    #[arg(long)]
    blob: bool,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// png or webp
    #[arg(long, default_value = "png")]
    format: ImageFormat,
    #[arg(long, default_value_t = 80)]
    quality: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = RenderConfig::from_env()?;
    if let Some(dir) = cli.font_dir {
        config.font_dir = Some(dir);
    }
    if let Some(ttl) = cli.cache_ttl {
        config.font_cache_ttl_secs = Some(ttl);
    }
    let tools = Tools::new(Orchestrator::from_config(config).context("failed to set up renderer")?);

    let result = match cli.command {
        Commands::List => tools.list_templates(),
        Commands::Describe { name } => tools.get_template(&name),
        Commands::Template {
            name,
            params,
            output,
        } => {
            let params: Value =
                serde_json::from_str(&params).context("--params must be a JSON object")?;
            let mut args = json!({
                "template": name,
                "params": params,
                "format": output.format,
            });
            if output.blob || output.out.is_none() {
                tools.call("generate_image_from_template", args).await
            } else {
                args["outputPath"] = json!(output.out);
                args["width"] = json!(output.width);
                args["height"] = json!(output.height);
                args["quality"] = json!(output.quality);
                tools.call("generate_from_template", args).await
            }
        }
        Commands::Markup { markup, output } => {
            let markup = if markup == "-" {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                markup
            };
            let mut args = json!({
                "jsx": markup,
                "format": output.format,
                "quality": output.quality,
                "outputPath": output.out.filter(|_| !output.blob),
            });
            if let Some(w) = output.width {
                args["width"] = json!(w);
            }
            if let Some(h) = output.height {
                args["height"] = json!(h);
            }
            tools.call("generate_image", args).await
        }
        Commands::Serve => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            return Ok(cardsmith::serve::serve(tools, stdin, tokio::io::stdout()).await?);
        }
    };

    println!("{}", result.joined_text());
    if result.is_error {
        std::process::exit(1);
    }
    Ok(())
}
