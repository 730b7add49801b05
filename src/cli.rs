use clap::{ArgAction, Parser};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Read-through caching proxy serving a Berkshelf universe from a Chef Server.
#[derive(Debug, Parser)]
#[command(name = "bodega", version, about)]
pub struct Cli {
    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Config file (TOML, YAML or JSON). Defaults to the platform config directory.
    #[arg(short, long, env = "BODEGA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Externally reachable URL of this proxy.
    #[arg(long = "base-url")]
    pub public_base_url: Option<String>,

    /// Chef Server URL, including the organization path.
    #[arg(long = "server")]
    pub server_url: Option<String>,

    /// Chef API client name.
    #[arg(long = "client")]
    pub client_name: Option<String>,

    /// Chef API client key (PEM).
    #[arg(long = "key")]
    pub key_path: Option<PathBuf>,

    /// Seconds between catalog refreshes.
    #[arg(long = "interval")]
    pub poll_interval_secs: Option<u64>,

    /// Don't verify upstream TLS certificates.
    #[arg(long, overrides_with = "verify_tls")]
    pub skip_tls: bool,

    /// Verify upstream TLS certificates.
    #[arg(long, overrides_with = "skip_tls")]
    pub verify_tls: bool,
}

/// The subset of [`bodega_config::Config`] that flags can set. Unset flags
/// serialize to nothing, so they don't mask lower configuration layers.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    listen: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poll_interval_secs: Option<u64>,
    upstream: UpstreamOverrides,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct UpstreamOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_tls_verify: Option<bool>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        let skip_tls_verify = match (self.skip_tls, self.verify_tls) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Overrides {
            listen: self.listen,
            public_base_url: self.public_base_url.clone(),
            poll_interval_secs: self.poll_interval_secs,
            upstream: UpstreamOverrides {
                server_url: self.server_url.clone(),
                client_name: self.client_name.clone(),
                key_path: self.key_path.clone(),
                skip_tls_verify,
            },
        }
    }

    /// Default log filter when `RUST_LOG` isn't set.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "bodega=info",
            1 => "bodega=debug",
            _ => "bodega=trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bodega").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_flags_no_overrides() {
        let cli = parse(&[]);
        assert_eq!(cli.overrides(), Overrides::default());
        assert_eq!(serde_json::to_string(&cli.overrides()).unwrap(), r#"{"upstream":{}}"#);
    }

    #[test]
    fn test_flags_map_onto_config_keys() {
        let cli = parse(&[
            "--listen",
            "127.0.0.1:9000",
            "--base-url",
            "https://bodega.example.com",
            "--server",
            "https://chef.example.com",
            "--client",
            "bodega",
            "--key",
            "/etc/bodega/client.pem",
            "--interval",
            "60",
            "--verify-tls",
        ]);
        let json = serde_json::to_value(cli.overrides()).unwrap();
        assert_eq!(json["listen"], "127.0.0.1:9000");
        assert_eq!(json["public_base_url"], "https://bodega.example.com");
        assert_eq!(json["poll_interval_secs"], 60);
        assert_eq!(json["upstream"]["server_url"], "https://chef.example.com");
        assert_eq!(json["upstream"]["client_name"], "bodega");
        assert_eq!(json["upstream"]["key_path"], "/etc/bodega/client.pem");
        assert_eq!(json["upstream"]["skip_tls_verify"], false);
    }

    #[rstest]
    #[case(&["--skip-tls"], Some(true))]
    #[case(&["--verify-tls"], Some(false))]
    #[case(&["--skip-tls", "--verify-tls"], Some(false))]
    #[case(&["--verify-tls", "--skip-tls"], Some(true))]
    #[case(&[], None)]
    fn test_tls_flags(#[case] args: &[&str], #[case] expected: Option<bool>) {
        assert_eq!(parse(args).overrides().upstream.skip_tls_verify, expected);
    }

    #[rstest]
    #[case(&[], "bodega=info")]
    #[case(&["-v"], "bodega=debug")]
    #[case(&["-vvv"], "bodega=trace")]
    fn test_verbosity(#[case] args: &[&str], #[case] expected: &str) {
        assert_eq!(parse(args).log_filter(), expected);
    }
}
