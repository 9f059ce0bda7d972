//! Request command

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use camino::Utf8Path;
use cloudgate_client::{ApiRequest, CancellationToken, Client, ClientConfig, Method, RetryContext};
use serde_json::Value;
use tracing::warn;

use crate::cli::RequestArgs;
use crate::commands::load_config;
use crate::output;

pub async fn run(args: RequestArgs, config_path: Option<&Utf8Path>, quiet: bool) -> Result<()> {
    let runtime = load_config(config_path)?;

    let mut retry = runtime.retry_for(&args.operation).clone();
    if let Some(max_retries) = args.max_retries {
        retry.max_retries = max_retries;
    }

    let mut client_config = ClientConfig::from_runtime(&runtime).with_retry(retry);
    if let Some(secs) = args.timeout_secs {
        client_config = client_config.with_request_timeout(Duration::from_secs(secs));
    }
    let client = Client::new(client_config).context("Failed to create API client")?;

    let request = build_request(&args)?;
    let ctx = RetryContext::with_token(cancel_on_ctrl_c());

    let started = Instant::now();
    let executor = client.executor();
    let pending = &request;
    let body = client
        .execute(&request.operation, &ctx, client.retry_config(), move || {
            executor.send(pending)
        })
        .await
        .with_context(|| format!("{} {} failed", request.method, request.path))?;

    if let Some(line) = completion_line(&request, started.elapsed(), quiet) {
        output::success(&line);
    }

    if let Some(rendered) = render_body(&body) {
        println!("{}", rendered);
    }
    Ok(())
}

/// Status line for a finished request; `None` under `--quiet`
fn completion_line(request: &ApiRequest, elapsed: Duration, quiet: bool) -> Option<String> {
    if quiet {
        return None;
    }
    Some(format!(
        "{} {} ({} ms)",
        request.method,
        request.path,
        elapsed.as_millis()
    ))
}

fn build_request(args: &RequestArgs) -> Result<ApiRequest> {
    let method = parse_method(&args.method)?;
    let request = ApiRequest::new(args.operation.as_str(), method, args.path.as_str());

    match &args.data {
        Some(data) => {
            let body: Value =
                serde_json::from_str(data).context("--data must be a valid JSON document")?;
            Ok(request.with_body(body))
        }
        None => Ok(request),
    }
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("Invalid HTTP method: {}", method))
}

/// Pretty JSON when the body parses, raw text otherwise, nothing when empty
fn render_body(body: &[u8]) -> Option<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).ok(),
        Err(_) => Some(String::from_utf8_lossy(body).into_owned()),
    }
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            child.cancel();
        }
    });
    token
}
