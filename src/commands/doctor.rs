//! The `doctor` command: environment sanity checks.

use crate::docker::{self, DockerClient};
use crate::error::Result;
use crate::port::{PortScanner, EPHEMERAL_END, EPHEMERAL_START};
use std::io::Write;
use std::time::Duration;

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_doctor() -> Result<()> {
    println!("Checking system requirements...\n");

    let mut all_ok = true;

    progress("Git: ");
    match version_of("git", &["--version"]).await {
        Some(version) => println!("{version}"),
        None => {
            println!("Not found");
            all_ok = false;
        }
    }

    progress("Docker socket: ");
    match docker::detect_docker_host() {
        Ok(host) => println!("{host}"),
        Err(e) => {
            println!("{e}");
            all_ok = false;
        }
    }

    progress("Docker daemon: ");
    match DockerClient::new() {
        Ok(client) => match client.ping().await {
            Ok(()) => {
                println!("Running");

                progress("Managed containers: ");
                match client.list_managed().await {
                    Ok(containers) => {
                        let groups = docker::group_by_env(containers.clone());
                        println!(
                            "{} container(s) across {} environment(s)",
                            containers.len(),
                            groups.len()
                        );
                    }
                    Err(e) => println!("listing failed: {e}"),
                }
            }
            Err(_) => {
                println!("Not running (start Docker Desktop or run: sudo systemctl start docker)");
                all_ok = false;
            }
        },
        Err(e) => {
            println!("{e}");
            all_ok = false;
        }
    }

    progress("Docker Compose: ");
    match version_of("docker", &["compose", "version"]).await {
        Some(version) => println!("{version}"),
        None => {
            println!("Not found (required for compose-pattern configurations)");
            all_ok = false;
        }
    }

    progress("Ephemeral port range: ");
    let used = PortScanner::new().used_ports(EPHEMERAL_START, EPHEMERAL_END);
    println!(
        "{} of {} ports in use",
        used.len(),
        u32::from(EPHEMERAL_END) - u32::from(EPHEMERAL_START) + 1
    );

    println!();
    if all_ok {
        println!("All required dependencies are available");
    } else {
        println!("Some required dependencies are missing");
    }

    Ok(())
}

fn progress(message: &str) {
    print!("{message}");
    std::io::stdout().flush().ok();
}

/// First line of `<binary> <args>` output, or None when unavailable.
async fn version_of(binary: &str, args: &[&str]) -> Option<String> {
    let output = tokio::time::timeout(
        VERSION_TIMEOUT,
        tokio::process::Command::new(binary).args(args).output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_string())
}
