use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::{is_match, ALLOWED_EXTENSIONS};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "facegate", about = "facegate face detection and recognition client")]
struct Cli {
    /// Base URL of a running facegated
    #[arg(short, long, default_value = "http://127.0.0.1:5001")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces and print their encodings and locations
    Detect {
        /// Image to analyse (png, jpg, jpeg or gif)
        image: PathBuf,
    },
    /// Check whether faces in one image match the face in a reference image
    Recognize {
        /// Reference image containing exactly one face
        known: PathBuf,
        /// Image whose faces are checked against the reference
        detect: PathBuf,
    },
    /// Compare two precomputed encodings (JSON arrays of numbers)
    Compare {
        known: PathBuf,
        detect: PathBuf,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.server.trim_end_matches('/');

    match cli.command {
        Commands::Detect { image } => {
            let form = Form::new().part("file", image_part(&image).await?);
            let body = post_form(&client, &format!("{base}/detection"), form).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Recognize { known, detect } => {
            let form = Form::new()
                .part("knownfile", image_part(&known).await?)
                .part("detectfile", image_part(&detect).await?);
            let body = post_form(&client, &format!("{base}/recognition"), form).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            print_verdicts(&body);
        }
        Commands::Compare { known, detect } => {
            let payload = serde_json::json!({
                "knownface": read_encoding(&known).await?,
                "detectface": read_encoding(&detect).await?,
            });
            let body: Value = client
                .post(format!("{base}/compare"))
                .json(&payload)
                .send()
                .await
                .context("cannot reach facegated")?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            print_verdicts(&body);
        }
        Commands::Status => {
            match client.get(format!("{base}/health")).send().await {
                Ok(resp) => {
                    let body: Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "health request failed");
                    println!("facegated: not reachable at {base}");
                }
            }
        }
    }

    Ok(())
}

/// The daemon's upload rule applied to the file name, so bad files fail
/// before upload.
fn allowed_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| facegate_core::allowed_file(&name.to_string_lossy()))
}

async fn image_part(path: &Path) -> Result<Part> {
    if !allowed_file(path) {
        bail!(
            "{}: unsupported file type (expected one of {})",
            path.display(),
            ALLOWED_EXTENSIONS.join(", ")
        );
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Part::bytes(bytes).file_name(filename))
}

/// POST a multipart form. The daemon answers invalid uploads with a redirect
/// to its HTML form, which is reported as an error here.
async fn post_form(client: &reqwest::Client, url: &str, form: Form) -> Result<Value> {
    let resp = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .context("cannot reach facegated")?
        .error_for_status()?;

    let is_json = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        bail!("upload rejected by facegated");
    }
    Ok(resp.json().await?)
}

async fn read_encoding(path: &Path) -> Result<Vec<f64>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("{}: expected a JSON array of numbers", path.display()))
}

/// Print one `match` / `no match` line per detected face of a `ret` reply.
fn print_verdicts(body: &Value) {
    if body["ret"].as_u64() != Some(0) {
        if let Some(msg) = body["msg"].as_str() {
            eprintln!("facegated: {msg}");
        }
        return;
    }
    for (i, distances) in body["results"].as_array().into_iter().flatten().enumerate() {
        let best = distances
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_f64)
            .fold(f64::INFINITY, f64::min);
        let verdict = if is_match(best) { "match" } else { "no match" };
        println!("face {i}: {verdict} (distance {best:.4})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file(Path::new("/tmp/a.JPG")));
        assert!(allowed_file(Path::new("a.b.png")));
        assert!(allowed_file(Path::new("photos/.png")));
        assert!(!allowed_file(Path::new("a")));
        assert!(!allowed_file(Path::new("/")));
        assert!(!allowed_file(Path::new("a.bmp")));
    }

    #[tokio::test]
    async fn test_image_part_rejects_extension_before_reading() {
        let err = image_part(Path::new("/does/not/exist.bmp")).await.unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_cli_parses_compare() {
        let cli = Cli::try_parse_from(["facegate", "--server", "http://h:1", "compare", "a.json", "b.json"])
            .unwrap();
        assert_eq!(cli.server, "http://h:1");
        assert!(matches!(cli.command, Commands::Compare { .. }));
    }

    #[test]
    fn test_print_verdicts_tolerates_failure_replies() {
        print_verdicts(&json!({"ret": 2, "msg": "knownface or detectface has no face"}));
        print_verdicts(&json!({"ret": 0, "results": [[0.1], [0.9]]}));
        print_verdicts(&json!({}));
    }
}
