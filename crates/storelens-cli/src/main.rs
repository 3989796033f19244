use clap::{Parser, Subcommand};

mod fetch;

#[derive(Debug, Parser)]
#[command(name = "storelens-cli")]
#[command(about = "Extract storefront insights from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract insights for one or more stores and print each record as JSON
    Fetch {
        /// Store URLs, e.g. https://shop.example.com
        #[arg(required = true)]
        urls: Vec<String>,

        /// Skip the LLM enhancement pass even when a key is configured
        #[arg(long)]
        no_enhance: bool,

        /// Print single-line JSON instead of pretty-printed output
        #[arg(long)]
        compact: bool,

        /// Maximum stores extracted at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Fetch {
            urls,
            no_enhance,
            compact,
            concurrency,
        }) => {
            let options = fetch::FetchOptions {
                no_enhance,
                compact,
                concurrency,
            };
            fetch::run_fetch(&urls, &options).await?;
        }
        None => println!("storelens-cli: run `storelens-cli fetch <url>`"),
    }

    Ok(())
}
