pub const CHECKOUT_ACTION: &str = "actions/checkout@";
pub const SETUP_NODE_ACTION: &str = "actions/setup-node@";

/// Node version used when `actions/setup-node` declares none.
pub const DEFAULT_NODE_VERSION: &str = "20";

const FALLBACK_IMAGE: &str = "ubuntu:latest";

/// Map a GitHub-hosted runner label to a CNB `docker.image`.
///
/// CNB only runs Linux containers, so Windows and macOS runners degrade to
/// `alpine:latest`.
pub fn runner_image(runs_on: Option<&str>) -> &'static str {
    match runs_on {
        Some("ubuntu-latest" | "ubuntu-24.04" | "ubuntu-22.04") => "ubuntu:22.04",
        Some("ubuntu-20.04") => "ubuntu:20.04",
        Some("windows-latest") => "alpine:latest",
        Some("macos-latest" | "macos-14" | "macos-13") => "alpine:latest",
        _ => FALLBACK_IMAGE,
    }
}

/// Strip a leading `v` and a trailing `.x`: `v18.x` -> `18`.
pub fn normalize_node_version(version: &str) -> String {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    let version = version.strip_suffix(".x").unwrap_or(version);
    version.to_string()
}

pub fn node_image(version: &str) -> String {
    format!("node:{}", normalize_node_version(version))
}
