use std::env;
use std::io::Read;

use anyhow::{bail, Context, Result};
use signaldb_cli::{build_engine, init_tracing, load_settings, Flags};
use signaldb_core::types::HANDLE_FIELD;
use signaldb_hybrid::{truncate_viewpoint, QueryByNameRequest, QueryRequest, QueryResponse};

const USAGE: &str = "Usage: signaldb <query|query-by-name|request|request-by-name|health> [args...]
  query <text...> [--trader NAME] [--sentiment LABEL] [--market true|false] [--asset T]... [--limit N]
  query-by-name <trader> [--sentiment LABEL] [--market true|false] [--asset T]... [--limit N]
  request | request-by-name      read a JSON request from stdin, print a JSON response
  health
Common flags: --memory (search the JSONL/CSV corpus in memory) --json";

fn print_response(resp: &QueryResponse, json: bool, preview_chars: usize) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(resp)?);
        return Ok(());
    }
    if !resp.trader_name.is_empty() {
        println!("Trader: {}", resp.trader_name);
    }
    if !resp.error_reason.is_empty() {
        println!("Note: {}", resp.error_reason);
    }
    println!("Found {} results", resp.results.len());
    for (i, doc) in resp.results.iter().enumerate() {
        let handle = doc.meta_str(HANDLE_FIELD).unwrap_or("?");
        println!("\n  {}. id={}  @{handle}", i + 1, doc.id);
        println!("     {}", truncate_viewpoint(&doc.text, preview_chars));
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).context("reading request from stdin")?;
    Ok(buf)
}

fn main() -> Result<()> {
    init_tracing("warn");
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };
    let flags = Flags::parse(args)?;
    let settings = load_settings()?;
    let engine = build_engine(&settings, flags.memory)?;
    let preview = engine.settings().viewpoint_max_chars;

    match cmd.as_str() {
        "query" => {
            let req = flags.request();
            if req.query_text.trim().is_empty() {
                bail!("query text is required\n{USAGE}");
            }
            print_response(&engine.respond(&req), flags.json, preview)?;
        }
        "query-by-name" => print_response(&engine.respond_by_name(&flags.by_name_request()?), flags.json, preview)?,
        "request" => {
            let req: QueryRequest = serde_json::from_str(&read_stdin()?).context("parsing query request")?;
            print_response(&engine.respond(&req), true, preview)?;
        }
        "request-by-name" => {
            let req: QueryByNameRequest = serde_json::from_str(&read_stdin()?).context("parsing query-by-name request")?;
            print_response(&engine.respond_by_name(&req), true, preview)?;
        }
        "health" => {
            let report = engine.health();
            if flags.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let docs = report.documents.map_or_else(|| "?".to_string(), |n| n.to_string());
                let table = report.table.as_deref().unwrap_or("-");
                let model = report.model.as_deref().unwrap_or("-");
                println!("status={} table={table} documents={docs} embedder={} model={model}", report.status, report.embedder);
                if let Some(e) = &report.error {
                    println!("error: {e}");
                }
            }
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
    Ok(())
}
