use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "vigia", about = "Vigia face recognition CLI")]
struct Cli {
    /// Base URL of the vigiad server
    #[arg(long, env = "VIGIA_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the faces in a photo
    Recognize {
        /// JPEG photo to analyse
        photo: PathBuf,
    },
    /// Register a person from one or more photos
    Register {
        #[arg(long)]
        nombre: String,
        /// Flag the person as dangerous
        #[arg(long)]
        peligroso: bool,
        #[arg(long)]
        dni: Option<String>,
        #[arg(long)]
        domicilio: Option<String>,
        #[arg(long)]
        correo_electronico: Option<String>,
        #[arg(long)]
        celular: Option<String>,
        /// Phone number to alert when this person is recognized
        #[arg(long)]
        a_notificar: Option<String>,
        /// JPEG photos of the person
        #[arg(required = true)]
        photos: Vec<PathBuf>,
    },
    /// List registered people
    List,
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base = cli.server.trim_end_matches('/');
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Recognize { photo } => {
            let form = Form::new().part("file", photo_part(&photo).await?);
            let body = send(client.post(format!("{base}/recognize_face/")).multipart(form)).await?;
            print_recognition(&body);
        }
        Commands::Register {
            nombre,
            peligroso,
            dni,
            domicilio,
            correo_electronico,
            celular,
            a_notificar,
            photos,
        } => {
            let mut form = Form::new()
                .text("nombre", nombre)
                .text("peligroso", peligroso.to_string());
            let optional = [
                ("dni", dni),
                ("domicilio", domicilio),
                ("correo_electronico", correo_electronico),
                ("celular", celular),
                ("a_notificar", a_notificar),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    form = form.text(key, value);
                }
            }
            for photo in &photos {
                form = form.part("files", photo_part(photo).await?);
            }

            let body = send(client.post(format!("{base}/register_person/")).multipart(form)).await?;
            println!("{}", body["message"].as_str().unwrap_or("registered"));
            if let Some(images) = body["imagenes_registradas"].as_array() {
                for image in images {
                    println!("  {}", image.as_str().unwrap_or_default());
                }
            }
        }
        Commands::List => {
            let body = send(client.get(format!("{base}/people"))).await?;
            let people = body.as_array().map(Vec::as_slice).unwrap_or_default();
            if people.is_empty() {
                println!("No people registered");
            }
            for person in people {
                let flag = if person["peligroso"].as_bool().unwrap_or(false) {
                    " [PELIGROSO]"
                } else {
                    ""
                };
                println!(
                    "{}{flag}  encodings={}  images={}",
                    person["nombre"].as_str().unwrap_or("?"),
                    person["encodings"],
                    person["imagenes"].as_array().map_or(0, Vec::len),
                );
            }
        }
        Commands::Status => {
            let body = send(client.get(format!("{base}/status"))).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

/// Read a photo into a multipart part, typed from its extension.
async fn photo_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".into());
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for(path))
        .context("invalid MIME type")
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Send a request and decode its JSON body, turning API errors into `detail`.
async fn send(request: reqwest::RequestBuilder) -> Result<Value> {
    let resp = request.send().await.context("failed to reach vigiad")?;
    let status = resp.status();
    let text = resp.text().await.context("failed to read response body")?;
    decode_response(status, &text)
}

fn decode_response(status: StatusCode, text: &str) -> Result<Value> {
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|body| body["detail"].as_str().map(str::to_owned))
            .unwrap_or_else(|| text.trim().to_owned());
        if detail.is_empty() {
            bail!("{status}");
        }
        bail!("{status}: {detail}");
    }
    tracing::debug!(%status, "request succeeded");
    serde_json::from_str(text).context("invalid JSON response")
}

fn print_recognition(body: &Value) {
    println!("status: {}", body["status"].as_str().unwrap_or("?"));
    for detection in body["detecciones"].as_array().map(Vec::as_slice).unwrap_or_default() {
        let name = detection["nombre"].as_str().unwrap_or("?");
        if detection["peligroso"].as_bool().unwrap_or(false) {
            println!("  {name} [PELIGROSO]");
        } else {
            println!("  {name}");
        }
    }
    match body["n8n_status"]["status"].as_str() {
        Some("success") => println!("webhook: delivered"),
        _ => {
            let n8n = &body["n8n_status"];
            let reason = n8n["message"]
                .as_str()
                .or_else(|| n8n["status_webhook"].as_str())
                .unwrap_or("unknown");
            println!("webhook: {reason}");
        }
    }
}
