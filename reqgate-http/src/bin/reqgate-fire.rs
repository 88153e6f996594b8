use std::process;
use std::sync::Arc;

use anyhow::Context;
use reqgate::{FireError, FireOptions, GlobalRegistry, RegistryOptions, RequestSession};
use reqgate_http::{HttpClient, status_validator};
use serde_json::json;

struct Args {
    url: String,
    method: String,
    count: usize,
    key: Option<String>,
    parallel: bool,
}

fn usage() {
    eprintln!("Usage: reqgate-fire <url> [--count N] [--key KEY] [--parallel] [--method METHOD]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --count <n>        Number of requests to fire [default: 1]");
    eprintln!("  --key <key>        Shared key; requests under one key run one at a time");
    eprintln!("  --parallel         Bypass the queue");
    eprintln!("  --method <method>  HTTP method [default: GET]");
    eprintln!();
    eprintln!("Environment: REQGATE_QUEUE_LOGS, REQGATE_TURN_TIMEOUT_MS, REQGATE_LOG, LOG_FORMAT");
}

#[tokio::main]
async fn main() {
    reqgate::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            usage();
            process::exit(2);
        }
    };

    match run(args).await {
        Ok(failed) if failed > 0 => process::exit(1),
        Ok(_) => {}
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut url: Option<String> = None;
    let mut method = "GET".to_string();
    let mut count = 1;
    let mut key = None;
    let mut parallel = false;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--count" => {
                i += 1;
                let raw = args.get(i).ok_or("--count requires a value")?;
                count = raw
                    .parse()
                    .map_err(|_| format!("invalid --count value: {raw}"))?;
            }
            "--key" => {
                i += 1;
                key = Some(args.get(i).ok_or("--key requires a value")?.clone());
            }
            "--method" => {
                i += 1;
                method = args.get(i).ok_or("--method requires a value")?.clone();
            }
            "--parallel" => parallel = true,
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => {
                if url.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                url = Some(arg.to_string());
            }
        }
        i += 1;
    }

    let url = url.ok_or("missing required argument: <url>")?;
    Ok(Args {
        url,
        method,
        count,
        key,
        parallel,
    })
}

/// Fire every request, print settled results in fire order, and return how
/// many were rejected.
async fn run(args: Args) -> anyhow::Result<usize> {
    let registry = GlobalRegistry::global();
    let options = RegistryOptions::from_env()
        .context("reading REQGATE_* environment")?
        .with_client(Arc::new(HttpClient::new()?))
        .with_queue(true);
    registry.configure(options);
    let validator = status_validator();
    registry.set_validator(move |response| validator.check(response));

    let mut handles = Vec::with_capacity(args.count);
    for n in 0..args.count {
        let session = RequestSession::new(
            Arc::clone(&registry),
            json!({ "method": args.method, "url": args.url }),
        );
        let mut options = FireOptions::new().with_parallel(args.parallel);
        if let Some(key) = &args.key {
            options = options.with_key(key.as_str());
        }
        handles.push(tokio::spawn(async move {
            let settled = session.fire(options).await;
            (n, session.key(), settled)
        }));
    }

    let mut failed = 0;
    for handle in handles {
        let (n, key, settled) = handle.await.context("fire task panicked")?;
        let line = match settled {
            Ok(response) => json!({ "n": n, "key": key, "ok": true, "response": response }),
            Err(FireError::Rejected(failure)) => {
                failed += 1;
                json!({
                    "n": n,
                    "key": key,
                    "ok": false,
                    "error": failure.to_string(),
                    "response": failure.result(),
                })
            }
            Err(e) => {
                failed += 1;
                json!({ "n": n, "key": key, "ok": false, "error": e.to_string() })
            }
        };
        println!("{line}");
    }

    Ok(failed)
}
