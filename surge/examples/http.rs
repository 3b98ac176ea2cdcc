use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use reqwest::{Client, StatusCode};
use surge::{
    BenchConfig, Benchmark, CheckError, Registry, Reporter, RunContext,
    init::HttpInitializer,
    report::{JsonFileReporter, StdoutReporter},
};
use tokio::time::Instant;

/// Responses slower than this block escalation for a while.
const SLOW_THRESHOLD: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request timeout, never reaching past the end of the run.
fn request_timeout(ctx: &RunContext) -> Duration {
    ctx.remaining().min(REQUEST_TIMEOUT)
}

#[derive(Parser, Debug)]
#[command(about = "Run a timed, self-escalating benchmark against a web service")]
struct Args {
    /// Comma-separated `host:port` list of the target
    #[arg(long, default_value = "localhost:8080")]
    remotes: String,
    /// Benchmark duration in seconds
    #[arg(long, default_value_t = 60)]
    duration: u64,
    /// Keep the load at its baseline level
    #[arg(long, default_value_t = false)]
    nolevelup: bool,
    /// Run the pre-test only
    #[arg(long, default_value_t = false)]
    test: bool,
    /// Path to write the result json
    #[arg(long)]
    output: Option<String>,
    #[arg(long, default_value = "")]
    jobid: String,
    /// Seed for reproducible random choices
    #[arg(long)]
    seed: Option<u64>,
}

/// Shared by every operation for the whole run.
struct Target {
    client: Client,
    base: String,
}

impl Target {
    /// GET `path`, count it, and flag it when slow.
    async fn get(&self, ctx: &RunContext, path: &str) -> Result<StatusCode, CheckError> {
        let started = Instant::now();
        let res = self
            .client
            .get(format!("{}{path}", self.base))
            .timeout(request_timeout(ctx))
            .send()
            .await
            .map_err(|e| CheckError::new(format!("GET {path}: {e}")))?;
        let status = res.status();
        res.bytes()
            .await
            .map_err(|e| CheckError::new(format!("GET {path}: {e}")))?;

        ctx.counters().increment(format!("GET|{path}"));
        if started.elapsed() > SLOW_THRESHOLD {
            ctx.report_slow_path(format!("GET {path}"));
        }
        Ok(status)
    }

    async fn post(&self, ctx: &RunContext, path: &str, body: String) -> Result<(), CheckError> {
        let res = self
            .client
            .post(format!("{}{path}", self.base))
            .body(body)
            .timeout(request_timeout(ctx))
            .send()
            .await
            .map_err(|e| CheckError::new(format!("POST {path}: {e}")))?;
        if !res.status().is_success() {
            return Err(CheckError::new(format!(
                "POST {path}: unexpected status code {}",
                res.status().as_u16()
            )));
        }
        ctx.counters().increment(format!("POST|{path}"));
        Ok(())
    }
}

fn registry() -> Result<Registry<Target>> {
    let mut registry = Registry::<Target>::new();

    registry.register_check("CheckIndex", |ctx, target| async move {
        match target.get(&ctx, "/").await? {
            StatusCode::OK => Ok(()),
            status => Err(CheckError::new(format!("GET /: status {}", status.as_u16()))),
        }
    });
    registry.register_check("CheckPostedMessage", |ctx, target| async move {
        target.post(&ctx, "/message", "hello".into()).await?;
        // a message we just posted must be readable right away
        match target.get(&ctx, "/message").await? {
            StatusCode::OK => Ok(()),
            status => Err(CheckError::fatal(format!(
                "posted message is not readable: status {}",
                status.as_u16()
            ))),
        }
    });

    registry
        .register_load(3, "LoadIndex", |ctx, target| async move {
            target.get(&ctx, "/").await.map(|_| ())
        })?
        .register_load(1, "LoadPost", |ctx, target| async move {
            target.post(&ctx, "/message", "load".into()).await
        })?
        .register_level_up_load(1, "LoadHistory", |ctx, target| async move {
            for page in 1..=5 {
                target.get(&ctx, &format!("/history/{page}")).await?;
            }
            Ok(())
        })?;

    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let remotes: Vec<&str> = args.remotes.split(',').filter(|s| !s.is_empty()).collect();
    let Some(first) = remotes.first() else {
        anyhow::bail!("invalid remotes");
    };
    let base = format!("http://{first}");

    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let target = Target {
        client: client.clone(),
        base: base.clone(),
    };

    let mut config = BenchConfig::builder()
        .duration(Duration::from_secs(args.duration))
        .no_level_up(args.nolevelup)
        .pre_test_only(args.test)
        .build();
    config.seed = args.seed;

    let result = Benchmark::new(registry()?, target)
        .config(config)
        .initializer(HttpInitializer::builder().base_url(base).client(client).build())
        .run()
        .await
        .with_job(args.jobid, args.remotes.clone());

    match args.output {
        Some(path) => JsonFileReporter::new(path).report(&result).await?,
        None => StdoutReporter.report(&result).await?,
    }
    Ok(())
}
