use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::{
    fs,
    io::{BufRead, BufReader, Write},
    path::PathBuf,
};
use supply_sentinel::config;
use toml_edit::{Item, TableLike};

/// sentinelctl: configure and exercise a running sentinel-server.
///
/// Config commands work on files only; the rest call the HTTP API.
#[derive(Debug, Parser)]
#[command(name = "sentinelctl")]
#[command(version)]
struct Cli {
    /// Base URL for the server (used by commands that call the HTTP API)
    #[arg(long, default_value = "http://127.0.0.1:18800")]
    url: String,

    /// Bearer token for /v1 routes when the server requires one
    #[arg(long, env = "SENTINEL_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Print/validate/update configuration files.
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },

    /// GET /health
    Health,

    /// GET /v1/status
    Status,

    /// Stream an analysis run and print each frame as it arrives
    Analyze {
        #[arg(long)]
        vendor_id: Option<String>,
        #[arg(long)]
        threat_id: Option<String>,
        #[arg(long)]
        query: Option<String>,
        /// Repeatable
        #[arg(long = "asset-id")]
        asset_ids: Vec<String>,
        /// Use the shorter, lower-latency analysis
        #[arg(long, default_value_t = false)]
        quick: bool,
    },

    /// Fetch the network risk graph, or stream it with --live
    Graph {
        #[arg(long)]
        vendor_id: Option<String>,
        #[arg(long)]
        threat_id: Option<String>,
        #[arg(long, default_value_t = false)]
        live: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCmd {
    /// Print a config example to stdout
    Example,

    /// Validate a config file (loads and parses TOML)
    Validate {
        #[arg(long)]
        path: PathBuf,
    },

    /// Show current config file (raw TOML)
    Show {
        #[arg(long)]
        path: PathBuf,
    },

    /// Set a config value. The server picks it up on next start.
    ///
    /// Key format: dotted path, e.g. `analysis.max_run_cost_usd`.
    Set {
        #[arg(long)]
        path: PathBuf,

        /// Dotted key (e.g. server.bind)
        key: String,

        /// Value. Simple auto-typing is supported: true/false, ints, floats, or string.
        value: String,
    },

    /// Unset a config value (remove key), falling back to the default.
    Unset {
        #[arg(long)]
        path: PathBuf,

        /// Dotted key (e.g. auth.secrets_file)
        key: String,
    },
}

struct Api {
    base: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl Api {
    fn new(base: &str, token: Option<String>) -> Result<Self> {
        // Streams stay open for the whole run, so no overall request timeout.
        let client = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()
            .context("build http client")?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn auth(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<()> {
        let u = self.url(path);
        let resp = self
            .auth(self.client.get(&u).query(params))
            .send()
            .with_context(|| format!("GET {u}"))?;
        print_json_response(resp)
    }

    /// POST a body to a streaming endpoint and print frames until `end` or `error`.
    fn stream(&self, path: &str, body: &Value) -> Result<()> {
        let u = self.url(path);
        let resp = self
            .auth(self.client.post(&u))
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .with_context(|| format!("POST {u}"))?;
        if !resp.status().is_success() {
            return print_json_response(resp);
        }

        let reader = BufReader::new(resp);
        for line in reader.lines() {
            let line = line.context("read stream")?;
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let frame: Value = serde_json::from_str(data.trim()).context("parse frame")?;
            println!("{frame}");
            match frame.get("type").and_then(Value::as_str) {
                Some("end") => return Ok(()),
                Some("error") => {
                    let code = frame.get("error").and_then(Value::as_str).unwrap_or("unknown");
                    anyhow::bail!("run failed: {code}");
                }
                _ => {}
            }
        }
        anyhow::bail!("stream closed before end frame")
    }
}

fn print_json_response(resp: reqwest::blocking::Response) -> Result<()> {
    let status = resp.status();
    let v: Value = resp.json().context("parse json")?;
    println!("{}", serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string()));
    if !status.is_success() {
        anyhow::bail!("request failed: {status}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Config { cmd } => handle_config(cmd)?,

        Cmd::Health => {
            let u = format!("{}/health", cli.url.trim_end_matches('/'));
            let txt = reqwest::blocking::get(&u)
                .with_context(|| format!("GET {u}"))?
                .text()
                .context("read response")?;
            println!("{txt}");
        }

        Cmd::Status => Api::new(&cli.url, cli.token)?.get_json("/v1/status", &[])?,

        Cmd::Analyze {
            vendor_id,
            threat_id,
            query,
            asset_ids,
            quick,
        } => {
            let body = serde_json::json!({
              "vendorId": vendor_id,
              "threatId": threat_id,
              "query": query,
              "assetIds": asset_ids,
              "analysisType": if quick { "quick" } else { "comprehensive" },
            });
            Api::new(&cli.url, cli.token)?.stream("/v1/analysis/stream", &body)?;
        }

        Cmd::Graph {
            vendor_id,
            threat_id,
            live,
        } => {
            let api = Api::new(&cli.url, cli.token)?;
            if live {
                let body = serde_json::json!({ "vendorId": vendor_id, "threatId": threat_id });
                api.stream("/v1/network-graph/live", &body)?;
            } else {
                let params = graph_params(vendor_id, threat_id);
                api.get_json("/v1/network-graph", &params)?;
            }
        }
    }

    Ok(())
}

/// Query pairs for the static graph, skipping unset fields.
fn graph_params(vendor_id: Option<String>, threat_id: Option<String>) -> Vec<(&'static str, String)> {
    [("vendorId", vendor_id), ("threatId", threat_id)]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect()
}

fn handle_config(cmd: ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Example => {
            let ex = include_str!("../../config.example.toml");
            print!("{ex}");
            Ok(())
        }
        ConfigCmd::Validate { path } => {
            let _ = config::Config::load(&path).with_context(|| format!("load {path:?}"))?;
            eprintln!("OK: {path:?}");
            Ok(())
        }
        ConfigCmd::Show { path } => {
            let txt = fs::read_to_string(&path).with_context(|| format!("read {path:?}"))?;
            print!("{txt}");
            Ok(())
        }
        ConfigCmd::Set { path, key, value } => set_config_value(&path, &key, &value),
        ConfigCmd::Unset { path, key } => unset_config_value(&path, &key),
    }
}

fn parse_toml_value(s: &str) -> toml_edit::Item {
    let t = s.trim();
    if matches!(t.to_lowercase().as_str(), "true" | "false") {
        return toml_edit::value(t.eq_ignore_ascii_case("true"));
    }
    if let Ok(i) = t.parse::<i64>() {
        return toml_edit::value(i);
    }
    if let Ok(f) = t.parse::<f64>() {
        return toml_edit::value(f);
    }
    toml_edit::value(t)
}

/// Split a dotted key into its last segment and the parent path.
fn dotted(key: &str) -> Result<(&str, Vec<&str>)> {
    let mut parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    match parts.pop() {
        Some(last) => Ok((last, parts)),
        None => anyhow::bail!("invalid key"),
    }
}

/// Re-parse with the real config struct, then validate ranges.
fn check_config(txt: &str) -> Result<()> {
    let cfg: config::Config = toml::from_str(txt).context("validate config")?;
    cfg.validate()
}

fn set_config_value(path: &PathBuf, dotted_key: &str, value: &str) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
    let mut doc = raw
        .parse::<toml_edit::DocumentMut>()
        .context("parse toml")?;

    let (last, parents) = dotted(dotted_key)?;
    let mut table: &mut dyn TableLike = doc.as_table_mut();
    for p in parents {
        let item = table.entry(p).or_insert(toml_edit::table());
        if !item.is_table_like() {
            *item = toml_edit::table();
        }
        table = item
            .as_table_like_mut()
            .with_context(|| format!("{p} is not a table"))?;
    }
    table.insert(last, parse_toml_value(value));

    let new_txt = doc.to_string();
    check_config(&new_txt)?;

    write_atomic(path, &new_txt)?;
    eprintln!("OK: set {dotted_key} in {path:?}");
    Ok(())
}

fn unset_config_value(path: &PathBuf, dotted_key: &str) -> Result<()> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {path:?}"))?;
    let mut doc = raw
        .parse::<toml_edit::DocumentMut>()
        .context("parse toml")?;

    let (last, parents) = dotted(dotted_key)?;
    let mut table: &mut dyn TableLike = doc.as_table_mut();
    for p in parents {
        // Missing parents, or parents that are plain values, leave nothing to remove.
        match table.get_mut(p).and_then(Item::as_table_like_mut) {
            Some(t) => table = t,
            None => return Ok(()),
        }
    }
    if table.remove(last).is_none() {
        return Ok(());
    }

    let new_txt = doc.to_string();
    check_config(&new_txt)?;

    write_atomic(path, &new_txt)?;
    eprintln!("OK: unset {dotted_key} in {path:?}");
    Ok(())
}

fn write_atomic(path: &PathBuf, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => std::path::Path::new("."),
    };
    let mut tf = tempfile::NamedTempFile::new_in(dir).context("create temp file")?;
    tf.write_all(contents.as_bytes()).context("write temp")?;
    tf.flush().ok();
    tf.persist(path).map_err(|e| anyhow::anyhow!(e)).context("persist")?;
    Ok(())
}
