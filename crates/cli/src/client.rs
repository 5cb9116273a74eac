//! One-shot client commands against a running `wayfinder serve` instance.
//!
//! Each command maps to one API call. Tenant identifiers are explicit
//! arguments on every call; there is no ambient tenant.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::{ClientArgs, OutputFormat};

/// Agent that surfaces non-2xx responses as responses, so the server's
/// JSON error payload can be read and shown.
fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into()
}

fn tenant_query(args: &ClientArgs) -> String {
    format!(
        "client_account_id={}&engagement_id={}",
        urlencoded(&args.account),
        urlencoded(&args.engagement)
    )
}

fn tenant_body(args: &ClientArgs) -> Value {
    serde_json::json!({
        "client_account_id": args.account,
        "engagement_id": args.engagement,
    })
}

pub(crate) fn cmd_init(
    args: &ClientArgs,
    flow_type: &str,
    output: OutputFormat,
) -> Result<(), String> {
    let mut body = tenant_body(args);
    body["flow_type"] = Value::String(flow_type.to_string());
    let record = post(args, "/flows", &body)?;
    match output {
        OutputFormat::Json => print_json(&record),
        OutputFormat::Text => {
            println!(
                "created flow {} ({}) at phase {}",
                field(&record, "flow_id"),
                field(&record, "flow_type"),
                field(&record, "current_phase"),
            );
            Ok(())
        }
    }
}

pub(crate) fn cmd_status(
    args: &ClientArgs,
    flow_id: &str,
    output: OutputFormat,
) -> Result<(), String> {
    let record = get(args, &format!("/flows/{flow_id}"))?;
    match output {
        OutputFormat::Json => print_json(&record),
        OutputFormat::Text => {
            print_record_summary(&record);
            Ok(())
        }
    }
}

pub(crate) fn cmd_list(args: &ClientArgs, output: OutputFormat) -> Result<(), String> {
    let listing = get(args, "/flows")?;
    match output {
        OutputFormat::Json => print_json(&listing),
        OutputFormat::Text => {
            let flows = listing
                .get("flows")
                .and_then(|f| f.as_array())
                .cloned()
                .unwrap_or_default();
            if flows.is_empty() {
                println!("no flows");
            }
            for record in &flows {
                println!(
                    "{}  {}  {}  phase={}",
                    field(record, "flow_id"),
                    field(record, "flow_type"),
                    field(record, "status"),
                    field(record, "current_phase"),
                );
            }
            Ok(())
        }
    }
}

pub(crate) fn cmd_advance(
    args: &ClientArgs,
    flow_id: &str,
    output: OutputFormat,
) -> Result<(), String> {
    let outcome = post(args, &format!("/flows/{flow_id}/advance"), &tenant_body(args))?;
    match output {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Text => {
            print_outcome_summary(&outcome);
            Ok(())
        }
    }
}

pub(crate) fn cmd_input(
    args: &ClientArgs,
    flow_id: &str,
    file: &Path,
    output: OutputFormat,
) -> Result<(), String> {
    let raw = if file == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("could not read stdin: {e}"))?;
        buffer
    } else {
        std::fs::read_to_string(file)
            .map_err(|e| format!("could not read {}: {e}", file.display()))?
    };
    let input: Value =
        serde_json::from_str(&raw).map_err(|e| format!("input payload is not valid JSON: {e}"))?;

    let mut body = tenant_body(args);
    body["input"] = input;
    let record = post(args, &format!("/flows/{flow_id}/input"), &body)?;
    match output {
        OutputFormat::Json => print_json(&record),
        OutputFormat::Text => {
            println!(
                "input applied to flow {} at phase {}",
                field(&record, "flow_id"),
                field(&record, "current_phase"),
            );
            Ok(())
        }
    }
}

pub(crate) fn cmd_cancel(
    args: &ClientArgs,
    flow_id: &str,
    output: OutputFormat,
) -> Result<(), String> {
    let record = post(args, &format!("/flows/{flow_id}/cancel"), &tenant_body(args))?;
    match output {
        OutputFormat::Json => print_json(&record),
        OutputFormat::Text => {
            println!("cancelled flow {}", field(&record, "flow_id"));
            Ok(())
        }
    }
}

pub(crate) fn cmd_delete(args: &ClientArgs, flow_id: &str, force: bool) -> Result<(), String> {
    let path = format!("/flows/{flow_id}?{}&force={force}", tenant_query(args));
    let url = format!("{}{}", base_url(args), path);
    let mut request = agent().delete(&url);
    if let Some(key) = &args.api_key {
        request = request.header("x-api-key", key);
    }
    let response = request
        .call()
        .map_err(|e| format!("request failed: {e}"))?;
    let status = response.status();
    if status.is_success() {
        println!("deleted flow {flow_id}");
        Ok(())
    } else {
        Err(error_from_response(status.as_u16(), response))
    }
}

// ── HTTP plumbing ────────────────────────────────────────────────────────────

fn base_url(args: &ClientArgs) -> String {
    args.server.trim_end_matches('/').to_string()
}

fn get(args: &ClientArgs, path: &str) -> Result<Value, String> {
    let url = format!("{}{}?{}", base_url(args), path, tenant_query(args));
    let mut request = agent().get(&url);
    if let Some(key) = &args.api_key {
        request = request.header("x-api-key", key);
    }
    let response = request
        .call()
        .map_err(|e| format!("request failed: {e}"))?;
    read_json_response(response)
}

fn post(args: &ClientArgs, path: &str, body: &Value) -> Result<Value, String> {
    let url = format!("{}{}", base_url(args), path);
    let mut request = agent().post(&url);
    if let Some(key) = &args.api_key {
        request = request.header("x-api-key", key);
    }
    let response = request
        .send_json(body)
        .map_err(|e| format!("request failed: {e}"))?;
    read_json_response(response)
}

fn read_json_response(response: ureq::http::Response<ureq::Body>) -> Result<Value, String> {
    let status = response.status();
    if status.is_success() {
        response
            .into_body()
            .read_json::<Value>()
            .map_err(|e| format!("could not parse server response: {e}"))
    } else {
        Err(error_from_response(status.as_u16(), response))
    }
}

fn error_from_response(status: u16, response: ureq::http::Response<ureq::Body>) -> String {
    let body = response
        .into_body()
        .read_json::<Value>()
        .unwrap_or(Value::Null);
    let message = body
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("unexpected server error");
    format!("server returned {status}: {message}")
}

fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(ch),
            ' ' => out.push_str("%20"),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}

// ── Output helpers ───────────────────────────────────────────────────────────

fn print_json(value: &Value) -> Result<(), String> {
    let pretty =
        serde_json::to_string_pretty(value).map_err(|e| format!("serialization error: {e}"))?;
    println!("{pretty}");
    Ok(())
}

fn field<'a>(record: &'a Value, name: &str) -> &'a str {
    record.get(name).and_then(|v| v.as_str()).unwrap_or("?")
}

fn print_record_summary(record: &Value) {
    println!(
        "{}  {}  {}  phase={}  version={}",
        field(record, "flow_id"),
        field(record, "flow_type"),
        field(record, "status"),
        field(record, "current_phase"),
        record.get("version").and_then(|v| v.as_i64()).unwrap_or(-1),
    );
    if let Some(state) = record.get("phase_state") {
        if let Some(gate) = state.get("gate").and_then(|g| g.as_str()) {
            println!("paused on gate: {gate}");
        }
        if let Some(missing) = state.get("missing").and_then(|m| m.as_array()) {
            for item in missing {
                println!("  missing: {}", field(item, "summary"));
            }
        }
        if let Some(error) = state.get("error").and_then(|e| e.as_str()) {
            println!("recorded error: {error}");
        }
    }
}

fn print_outcome_summary(outcome: &Value) {
    match field(outcome, "outcome") {
        "advanced" => println!("advanced to phase {}", field(outcome, "phase")),
        "completed" => println!("flow completed"),
        "paused" => {
            println!("paused on gate {}", field(outcome, "gate"));
            if let Some(missing) = outcome.get("missing").and_then(|m| m.as_array()) {
                for item in missing {
                    println!("  missing: {}", field(item, "summary"));
                }
            }
        }
        "already_advanced" => println!(
            "already advanced by a concurrent call; now at phase {}",
            field(outcome, "current_phase")
        ),
        "failed" => println!(
            "phase {} failed: {}",
            field(outcome, "phase"),
            field(outcome, "error")
        ),
        other => println!("outcome: {other}"),
    }
}
