use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Client, Method, Response};
use serde_json::{json, Value};

/// Operator client for the CASFOS records portal.
#[derive(Debug, Parser)]
#[command(name = "casfos-admin", version, about)]
struct Cli {
    /// Base URL of the portal.
    #[arg(long, env = "CASFOS_URL", default_value = "http://localhost:5000")]
    url: String,

    #[arg(short, long, env = "CASFOS_USERNAME")]
    username: String,

    #[arg(short, long, env = "CASFOS_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the credentials and print the logged-in user.
    Login,
    /// List records awaiting review.
    Pending { kind: Kind },
    /// Mark a record as verified (faculty and faculty updates only).
    Verify { kind: Kind, id: String },
    /// Approve a pending record.
    Approve { kind: Kind, id: String },
    /// Reject a pending record.
    Reject {
        kind: Kind,
        id: String,
        #[arg(short, long)]
        remarks: String,
    },
    /// Print the stock counters.
    Stock,
    /// Upload a bill or photograph and print its URL.
    Upload { file: PathBuf },
    /// Database backup job.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Debug, Subcommand)]
enum BackupAction {
    /// Start a backup run now.
    Run,
    /// Show the schedule and the last run report.
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Users,
    Faculty,
    FacultyUpdates,
    Purchases,
    Issues,
    Returns,
    Services,
    Disposals,
}

impl Kind {
    fn base_path(self) -> &'static str {
        match self {
            Kind::Users => "/api/users",
            Kind::Faculty => "/api/faculty",
            Kind::FacultyUpdates => "/api/faculty-updates",
            Kind::Purchases => "/api/assets/purchases",
            Kind::Issues => "/api/assets/issues",
            Kind::Returns => "/api/assets/returns",
            Kind::Services => "/api/assets/services",
            Kind::Disposals => "/api/assets/disposals",
        }
    }

    fn has_verification(self) -> bool {
        matches!(self, Kind::Faculty | Kind::FacultyUpdates)
    }
}

/// Pull the `error` field out of an API error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// HTTP client holding the session cookie for the lifetime of the process.
struct PortalClient {
    http: Client,
    base_url: String,
}

impl PortalClient {
    fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;
        if !status.is_success() {
            bail!("{status}: {}", error_message(&body));
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).context("Response is not valid JSON")
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let mut request = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {path} failed"))?;
        Self::check(response).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<Value> {
        let body = json!({ "username": username, "password": password });
        self.send(Method::POST, "/api/auth/login", Some(body)).await
    }

    async fn upload(&self, file: &Path) -> Result<Value> {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name)
            .mime_str(&content_type_for(file))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/api/uploads", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("Upload request failed")?;
        Self::check(response).await
    }
}

fn print(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = PortalClient::new(&cli.url)?;

    let login = client
        .login(&cli.username, &cli.password)
        .await
        .context("Login failed")?;

    let output = match cli.command {
        Command::Login => login["user"].clone(),
        Command::Pending { kind } => {
            client
                .send(Method::GET, &format!("{}/pending", kind.base_path()), None)
                .await?
        }
        Command::Verify { kind, id } => {
            if !kind.has_verification() {
                bail!("{kind:?} records are approved without verification");
            }
            client
                .send(Method::PUT, &format!("{}/verify/{id}", kind.base_path()), None)
                .await?
        }
        Command::Approve { kind, id } => {
            client
                .send(Method::PUT, &format!("{}/approve/{id}", kind.base_path()), None)
                .await?
        }
        Command::Reject { kind, id, remarks } => {
            client
                .send(
                    Method::PUT,
                    &format!("{}/reject/{id}", kind.base_path()),
                    Some(json!({ "remarks": remarks })),
                )
                .await?
        }
        Command::Stock => client.send(Method::GET, "/api/assets/stock", None).await?,
        Command::Upload { file } => client.upload(&file).await?,
        Command::Backup { action } => match action {
            BackupAction::Run => client.send(Method::POST, "/api/admin/backup", None).await?,
            BackupAction::Status => client.send(Method::GET, "/api/admin/backup", None).await?,
        },
    };

    print(&output)?;

    if let Err(e) = client.send(Method::POST, "/api/auth/logout", None).await {
        eprintln!("Warning: logout failed: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_paths() {
        assert_eq!(Kind::Users.base_path(), "/api/users");
        assert_eq!(Kind::FacultyUpdates.base_path(), "/api/faculty-updates");
        assert_eq!(Kind::Disposals.base_path(), "/api/assets/disposals");
        assert!(Kind::Faculty.has_verification());
        assert!(!Kind::Purchases.has_verification());
    }

    #[test]
    fn test_kind_parses_kebab_case() {
        let cli = Cli::try_parse_from([
            "casfos-admin",
            "-u",
            "admin",
            "-p",
            "secret",
            "approve",
            "faculty-updates",
            "abc",
        ])
        .unwrap();
        match cli.command {
            Command::Approve { kind, id } => {
                assert_eq!(kind, Kind::FacultyUpdates);
                assert_eq!(id, "abc");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reject_requires_remarks() {
        let result = Cli::try_parse_from([
            "casfos-admin", "-u", "admin", "-p", "secret", "reject", "purchases", "abc",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"Not found: x"}"#), "Not found: x");
        assert_eq!(error_message("plain failure\n"), "plain failure");
    }

    #[test]
    fn test_content_type_guess() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(content_type_for(&dir.path().join("bill.pdf")), "application/pdf");
        assert_eq!(content_type_for(&dir.path().join("photo.JPG")), "image/jpeg");
        assert_eq!(
            content_type_for(&dir.path().join("notes")),
            "application/octet-stream"
        );
    }
}
