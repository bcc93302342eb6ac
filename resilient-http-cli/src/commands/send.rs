//! Send command - issue one request through a resilient client.

use colored::Colorize;
use resilient_http::{
    CircuitBreakerConfig, ClientConfig, Method, ResilientClient, Response, RetryConfig,
    RetryConfigOverride,
};
use std::fs;
use std::io::{self, Read};
use std::time::Duration;
use tracing::debug;

use crate::RequestArgs;
use crate::error::{CliError, CliResult};

/// Send the request described by `args` and print the response.
pub async fn run(method: Method, args: RequestArgs) -> CliResult<()> {
    let client = ResilientClient::new(client_config(&args)?)?;

    let mut request = client.request(method, args.url.as_str());
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        request = request.header(name, value);
    }

    if let Some(data) = &args.data {
        request = match Body::parse(read_data(data)?) {
            Body::Json(value) => request.json(&value),
            Body::Text(text) => request.text(text),
        };
    }

    let response = request.send().await?;
    print_response(&response, args.include);
    Ok(())
}

fn client_config(args: &RequestArgs) -> CliResult<ClientConfig> {
    let overrides = RetryConfigOverride {
        max_retries: args.retries,
        timeout: args.timeout.map(Duration::from_millis),
        base_delay: args.base_delay.map(Duration::from_millis),
        max_delay: args.max_delay.map(Duration::from_millis),
        jitter: args.no_jitter.then_some(false),
        ..Default::default()
    };
    let retry = RetryConfig::default().merge(&overrides)?;

    let circuit_breaker = if args.no_circuit_breaker {
        CircuitBreakerConfig::disabled()
    } else {
        CircuitBreakerConfig::default()
    };

    debug!(
        max_retries = retry.max_retries,
        timeout = ?retry.timeout,
        base_delay = ?retry.base_delay,
        max_delay = ?retry.max_delay,
        jitter = retry.jitter,
        circuit_breaker = circuit_breaker.enabled,
        "Effective client configuration"
    );

    Ok(ClientConfig::builder()
        .retry(retry)
        .circuit_breaker(circuit_breaker)
        .on_retry(|attempt, error| {
            eprintln!("  {} #{}: {}", "Retry".yellow().bold(), attempt, error);
        })
        .on_circuit_open(|| eprintln!("  {} circuit opened", "⚠".yellow()))
        .build())
}

/// Split a `Name: value` header argument.
fn parse_header(raw: &str) -> CliResult<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => Err(CliError::InvalidArgument(format!(
            "header must look like 'Name: value', got '{}'",
            raw
        ))),
    }
}

/// Resolve `-d` data: `@path` reads a file, `-` reads stdin.
fn read_data(data: &str) -> CliResult<String> {
    if data == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else if let Some(path) = data.strip_prefix('@') {
        Ok(fs::read_to_string(path)?)
    } else {
        Ok(data.to_string())
    }
}

#[derive(Debug, PartialEq)]
enum Body {
    Json(serde_json::Value),
    Text(String),
}

impl Body {
    fn parse(data: String) -> Self {
        match serde_json::from_str(&data) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Text(data),
        }
    }
}

fn print_response(response: &Response, include: bool) {
    if include {
        let status = response.status();
        let line = format!("HTTP {}", status);
        if status.is_success() {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line.yellow().bold());
        }
        for (name, value) in response.headers() {
            println!(
                "{}: {}",
                name.as_str().cyan(),
                String::from_utf8_lossy(value.as_bytes())
            );
        }
        println!();
    }

    println!("{}", render_body(response));
}

fn render_body(response: &Response) -> String {
    if let Ok(value) = response.json::<serde_json::Value>()
        && let Ok(pretty) = serde_json::to_string_pretty(&value)
    {
        return pretty;
    }
    String::from_utf8_lossy(response.bytes()).into_owned()
}
