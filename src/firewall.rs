//! Host firewall port management
//!
//! Ports newly listened on by a website are opened in the background; a
//! missing or unsupported firewall tool is logged and tolerated.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirewallKind {
    Ufw,
    Firewalld,
}

async fn detect() -> Option<FirewallKind> {
    if command_exists("ufw").await {
        Some(FirewallKind::Ufw)
    } else if command_exists("firewall-cmd").await {
        Some(FirewallKind::Firewalld)
    } else {
        None
    }
}

async fn command_exists(name: &str) -> bool {
    tokio::process::Command::new("sh")
        .args(["-c", &format!("command -v {}", name)])
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Open the given TCP ports on the host firewall
pub async fn open_ports(ports: &[u16]) -> Result<()> {
    if ports.is_empty() {
        return Ok(());
    }

    let Some(kind) = detect().await else {
        tracing::warn!("No supported firewall tool found, skipping port open");
        return Ok(());
    };

    for port in ports {
        let command = match kind {
            FirewallKind::Ufw => format!("ufw allow {}/tcp", port),
            FirewallKind::Firewalld => {
                format!("firewall-cmd --permanent --add-port={}/tcp && firewall-cmd --reload", port)
            }
        };
        run(&command).await?;
        tracing::info!("Opened firewall port {}", port);
    }
    Ok(())
}

async fn run(command: &str) -> Result<()> {
    let output = tokio::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Other(format!(
            "firewall command '{}' failed: {}",
            command,
            stderr.trim()
        )));
    }
    Ok(())
}
