//! Process configuration: CLI flags (each with an environment-variable
//! fallback, per the teacher's `kubelet::config::Opts` pattern) plus the
//! watched configuration surface described in `spec.md` §6.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

fn parse_duration_secs(s: &str) -> Result<Duration, std::num::ParseIntError> {
    Ok(Duration::from_secs(s.parse()?))
}

#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "karavi-gateway", about = "Authorization and quota-enforcement gateway for CSI storage arrays")]
pub struct Opts {
    /// Address the HTTPS ingress listener binds.
    #[structopt(long, env = "GATEWAY_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Address the administrative gRPC listener binds.
    #[structopt(long, env = "GATEWAY_GRPC_ADDR", default_value = "0.0.0.0:50051")]
    pub grpc_addr: SocketAddr,

    /// TLS certificate for the ingress listener.
    #[structopt(long, env = "GATEWAY_TLS_CERT")]
    pub tls_cert_path: PathBuf,

    /// TLS private key for the ingress listener.
    #[structopt(long, env = "GATEWAY_TLS_KEY")]
    pub tls_key_path: PathBuf,

    /// File holding the HS256 signing secret; reloaded live on change.
    #[structopt(long, env = "GATEWAY_SIGNING_SECRET_FILE")]
    pub signing_secret_path: PathBuf,

    /// YAML file of role instances, watched for change.
    #[structopt(long, env = "GATEWAY_ROLES_FILE")]
    pub roles_path: PathBuf,

    /// YAML file of storage-array records, watched for change.
    #[structopt(long, env = "GATEWAY_STORAGE_FILE")]
    pub storage_path: PathBuf,

    /// Redis-compatible KV store address, e.g. `redis://127.0.0.1:6379`.
    #[structopt(long, env = "GATEWAY_KVSTORE_ADDR")]
    pub kvstore_addr: String,

    /// Base URL of the policy service, e.g. `http://opa:8181`.
    #[structopt(long, env = "GATEWAY_POLICY_HOST")]
    pub policy_host: String,

    /// Per-call deadline for policy and KV-store calls.
    #[structopt(long, env = "GATEWAY_CALL_DEADLINE_SECS", default_value = "5", parse(try_from_str = parse_duration_secs))]
    pub call_deadline: Duration,

    /// Log format: `text` or `json`.
    #[structopt(long, env = "GATEWAY_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// How long graceful shutdown waits for in-flight requests to drain.
    #[structopt(long, env = "GATEWAY_SHUTDOWN_TIMEOUT_SECS", default_value = "15", parse(try_from_str = parse_duration_secs))]
    pub shutdown_timeout: Duration,
}

impl Opts {
    pub fn from_env_and_args() -> Self {
        Opts::from_args()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_required_flags_only() {
        let opts = Opts::from_iter(&[
            "karavi-gateway",
            "--tls-cert-path=/tmp/cert.pem",
            "--tls-key-path=/tmp/key.pem",
            "--signing-secret-path=/tmp/secret",
            "--roles-path=/tmp/roles.yaml",
            "--storage-path=/tmp/storage.yaml",
            "--kvstore-addr=redis://127.0.0.1:6379",
            "--policy-host=http://127.0.0.1:8181",
        ]);
        assert_eq!(opts.listen_addr.port(), 8080);
        assert_eq!(opts.grpc_addr.port(), 50051);
        assert_eq!(opts.shutdown_timeout, Duration::from_secs(15));
    }
}
