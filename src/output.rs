//! Shared text rendering for command output.

use crate::model::{PortAllocation, WorktreeEnv};

/// Container ports that most likely serve HTTP and get a clickable
/// `http://` prefix in text output.
const HTTP_LIKELY_PORTS: [u16; 12] = [
    80, 443, 3000, 3001, 4200, 5000, 5173, 8000, 8080, 8443, 8888, 9000,
];

/// Format an allocation as a user-facing address, based on the container
/// port (what the service actually is), rendered with the host port (where
/// it answers).
pub fn service_address(alloc: &PortAllocation) -> String {
    if HTTP_LIKELY_PORTS.contains(&alloc.container_port) {
        format!("http://localhost:{}", alloc.host_port)
    } else {
        format!("localhost:{}", alloc.host_port)
    }
}

/// Comma-joined host ports in numeric order, or `-` when none. Numeric
/// sorting matters: lexicographic order would put 15432 before 3000.
pub fn ports_list(allocations: &[PortAllocation]) -> String {
    if allocations.is_empty() {
        return "-".to_string();
    }
    let mut ports: Vec<u16> = allocations.iter().map(|a| a.host_port).collect();
    ports.sort_unstable();
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// The `Services:` block shared by create/start text output.
pub fn print_services(env: &WorktreeEnv) {
    if env.port_allocations.is_empty() {
        return;
    }
    println!();
    println!("  Services:");
    for alloc in &env.port_allocations {
        println!(
            "    {:<10} {}  (container: {})",
            alloc.service_name,
            service_address(alloc),
            alloc.container_port
        );
    }
}

/// Fixed-width environment table for `list`.
pub fn print_env_table(envs: &[WorktreeEnv]) {
    if envs.is_empty() {
        println!("No worktree environments found.");
        return;
    }

    println!(
        "{:<20} {:<20} {:<10} {:<10} {}",
        "NAME", "BRANCH", "STATUS", "SERVICES", "PORTS"
    );
    for env in envs {
        println!(
            "{:<20} {:<20} {:<10} {:<10} {}",
            env.name,
            env.branch,
            env.status,
            env.port_allocations.len(),
            ports_list(&env.port_allocations),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    fn alloc(container: u16, host: u16) -> PortAllocation {
        PortAllocation {
            service_name: "app".to_string(),
            container_port: container,
            host_port: host,
            protocol: Protocol::Tcp,
            label: None,
        }
    }

    #[test]
    fn http_likely_ports_get_scheme() {
        assert_eq!(service_address(&alloc(3000, 13000)), "http://localhost:13000");
        assert_eq!(service_address(&alloc(8080, 28080)), "http://localhost:28080");
        assert_eq!(service_address(&alloc(443, 10443)), "http://localhost:10443");
    }

    #[test]
    fn non_http_ports_render_bare() {
        assert_eq!(service_address(&alloc(5432, 15432)), "localhost:15432");
        assert_eq!(service_address(&alloc(6379, 16379)), "localhost:16379");
    }

    #[test]
    fn ports_list_sorts_numerically() {
        let allocs = vec![alloc(5432, 15432), alloc(3000, 3000), alloc(6379, 16379)];
        assert_eq!(ports_list(&allocs), "3000,15432,16379");
    }

    #[test]
    fn empty_ports_list_is_dash() {
        assert_eq!(ports_list(&[]), "-");
    }
}
