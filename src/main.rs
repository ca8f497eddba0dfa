use clap::{Parser, Subcommand};
use model_run_adapter::runner::{
    AdapterArgs, AdapterArgsBuilder, PipelineArgs, fetch_artifact, run_pipeline,
};
use std::io::Write;
use std::time::Duration;

#[derive(Parser, Clone)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Object store connection flags shared by every subcommand
#[derive(clap::Args, Clone)]
struct StoreArgs {
    /// S3-compatible endpoint (host:port or URL); local files are used when absent
    #[arg(long, env = "MINIO_ENDPOINT")]
    object_store_endpoint: Option<String>,

    /// Object store access key
    #[arg(long, env = "MINIO_ACCESS_KEY")]
    access_key: Option<String>,

    /// Object store secret key
    #[arg(long, env = "MINIO_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Region reported to the object store
    #[arg(long)]
    region: Option<String>,

    /// Connect over https when the endpoint has no scheme
    #[arg(long, env = "MINIO_SECURE", default_value = "false")]
    secure: bool,

    /// Seconds to wait for a single status poll
    #[arg(long)]
    status_timeout: Option<u64>,
}

impl StoreArgs {
    fn to_adapter_args(&self) -> anyhow::Result<AdapterArgs> {
        let mut builder = AdapterArgsBuilder::default();
        builder.secure(self.secure);
        if let Some(region) = &self.region {
            builder.region(region.clone());
        }
        if let Some(seconds) = self.status_timeout {
            builder.status_timeout(Duration::from_secs(seconds));
        }
        if let Some(endpoint) = &self.object_store_endpoint {
            builder.object_store_endpoint(endpoint.clone());
        }
        if let Some(access_key) = &self.access_key {
            builder.access_key(access_key.clone());
        }
        if let Some(secret_key) = &self.secret_key {
            builder.secret_key(secret_key.clone());
        }
        Ok(builder.build()?)
    }
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Drive one model run end to end, storing the input as its result
    Run {
        /// Input artifact (file://path or bucket/key)
        #[arg(short, long)]
        input: String,

        /// Output artifact (file://path or bucket/key)
        #[arg(short, long)]
        output: String,

        /// Base path recorded in the run configuration
        #[arg(long)]
        base_path: Option<String>,

        /// Keep the result inline instead of writing the output artifact
        #[arg(long)]
        inline: bool,

        /// Quiet mode - only print the final run info
        #[arg(short, long)]
        quiet: bool,

        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print a stored artifact to stdout
    Fetch {
        /// Artifact path (file://path or bucket/key)
        #[arg(short, long)]
        path: String,

        #[command(flatten)]
        store: StoreArgs,
    },
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if quiet {
        EnvFilter::new("model_run_adapter=warn")
    } else {
        EnvFilter::new("model_run_adapter=info")
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            input,
            output,
            base_path,
            inline,
            quiet,
            store,
        } => {
            init_tracing(quiet);
            let pipeline_args = PipelineArgs {
                adapter: store.to_adapter_args()?,
                input_path: input,
                output_path: output,
                base_path,
                inline,
            };
            run(pipeline_args, quiet).await?;
        }
        Command::Fetch { path, store } => {
            init_tracing(true);
            let content = fetch_artifact(&store.to_adapter_args()?, &path).await?;
            std::io::stdout().write_all(&content)?;
        }
    }
    Ok(())
}

async fn run(args: PipelineArgs, quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Model Run Adapter");
        println!("=================");
        println!("Input: {}", args.input_path);
        println!("Output: {}", args.output_path);
        println!(
            "Storage: {}",
            args.adapter
                .object_store_endpoint
                .as_deref()
                .unwrap_or("local files")
        );
        println!();
    }

    let result = run_pipeline(args).await?;

    println!("{}", serde_json::to_string_pretty(&result.info)?);

    if !quiet {
        println!();
        println!("Run Summary");
        println!("===========");
        println!("Runs started: {}", result.stats.runs_started);
        println!("Runs succeeded: {}", result.stats.runs_succeeded);
        println!("Results stored: {}", result.stats.results_stored);
        println!("Results inline: {}", result.stats.results_inline);
        println!("Bytes stored: {}", result.stats.bytes_stored);
        println!("Duration: {:.2}s", result.duration.as_secs_f64());
    }

    Ok(())
}
