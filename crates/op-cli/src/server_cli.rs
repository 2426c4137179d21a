use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::Parser;
use op_types::config::{AuthConfig, DEFAULT_SOCKS_PROXY, DialerConfig, RedirectConfig, ServerConfig, SocksCredentials};

const DEFAULT_SERVER_PORT: u16 = 2222;

#[derive(Debug, Parser)]
#[command(
    name = "onionpass",
    version,
    about = "SSH gateway that forwards direct-tcpip channels to .onion services"
)]
pub struct ServerArgs {
    /// Address to bind the SSH server to
    #[arg(long, value_name = "ADDR", env = "ONIONPASS_BIND", default_value = "0.0.0.0")]
    pub bind: String,
    /// Listening port for the SSH server
    #[arg(short = 'p', long, alias = "sshport", value_name = "PORT", env = "ONIONPASS_PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,
    /// Private key used as the server identity
    #[arg(long, value_name = "PATH", env = "ONIONPASS_HOST_KEY", default_value = "id_rsa")]
    pub host_key: PathBuf,
    /// Create an Ed25519 host key at --host-key if it does not exist
    #[arg(long, env = "ONIONPASS_GENERATE_HOST_KEY", action = clap::ArgAction::SetTrue)]
    pub generate_host_key: bool,

    /// SOCKS5 proxy used to reach .onion services (host:port or socks5h:// URL)
    #[arg(long, value_name = "ADDR", env = "ONIONPASS_SOCKS_PROXY", help_heading = "Outbound")]
    pub socks_proxy: Option<String>,
    #[arg(long, value_name = "USER", env = "ONIONPASS_SOCKS_USERNAME", requires = "socks_password", help_heading = "Outbound")]
    pub socks_username: Option<String>,
    #[arg(long, value_name = "PASS", env = "ONIONPASS_SOCKS_PASSWORD", requires = "socks_username", help_heading = "Outbound")]
    pub socks_password: Option<String>,
    /// Connect to destinations without a proxy (testing only; .onion names will not resolve)
    #[arg(
        long,
        env = "ONIONPASS_DIRECT",
        action = clap::ArgAction::SetTrue,
        conflicts_with_all = ["socks_proxy", "socks_username", "socks_password"],
        help_heading = "Outbound"
    )]
    pub direct: bool,

    /// Only accept public keys listed in this authorized_keys file
    #[arg(long, value_name = "PATH", env = "ONIONPASS_AUTHORIZED_KEYS", help_heading = "Authentication")]
    pub authorized_keys: Option<PathBuf>,
    /// Also accept any password when --authorized-keys is set
    #[arg(long, env = "ONIONPASS_ALLOW_PASSWORD", action = clap::ArgAction::SetTrue, help_heading = "Authentication")]
    pub allow_password: bool,

    /// Seconds a client has to authenticate
    #[arg(long, value_name = "SECS", env = "ONIONPASS_AUTH_TIMEOUT", default_value_t = 10)]
    pub auth_timeout: u64,
    /// Seconds allowed for establishing each forward
    #[arg(long, value_name = "SECS", env = "ONIONPASS_DIAL_TIMEOUT", default_value_t = 25)]
    pub dial_timeout: u64,

    /// Serve an HTTP redirect to the project page on this port
    #[arg(long, alias = "httpport", value_name = "PORT", env = "ONIONPASS_HTTP_PORT", help_heading = "HTTP")]
    pub http_port: Option<u16>,
    /// Redirect target for the HTTP responder
    #[arg(long, value_name = "URL", env = "ONIONPASS_REDIRECT_URL", help_heading = "HTTP")]
    pub redirect_url: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL", env = "ONIONPASS_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl ServerArgs {
    pub fn to_run_config(&self) -> Result<ServerConfig> {
        if self.auth_timeout == 0 || self.dial_timeout == 0 {
            bail!("--auth-timeout and --dial-timeout must be at least one second");
        }

        let auth = match &self.authorized_keys {
            Some(path) => AuthConfig::AuthorizedKeys {
                path: path.clone(),
                allow_password: self.allow_password,
            },
            None if self.allow_password => bail!("--allow-password only applies together with --authorized-keys"),
            None => AuthConfig::AllowAll,
        };

        Ok(ServerConfig {
            bind: self.bind.clone(),
            port: self.port,
            host_key: self.host_key.clone(),
            generate_host_key: self.generate_host_key,
            auth_timeout: Duration::from_secs(self.auth_timeout),
            dial_timeout: Duration::from_secs(self.dial_timeout),
            dialer: self.dialer_config()?,
            auth,
        })
    }

    pub fn to_redirect_config(&self) -> Option<RedirectConfig> {
        let port = self.http_port?;
        let defaults = RedirectConfig::default();
        Some(RedirectConfig {
            bind: self.bind.clone(),
            port,
            location: self.redirect_url.clone().unwrap_or(defaults.location),
        })
    }

    fn dialer_config(&self) -> Result<DialerConfig> {
        if self.direct {
            return Ok(DialerConfig::Direct);
        }

        let (proxy, url_credentials) = parse_socks_proxy(self.socks_proxy.as_deref().unwrap_or(DEFAULT_SOCKS_PROXY))?;
        let credentials = match (&self.socks_username, &self.socks_password) {
            (Some(username), Some(password)) => Some(SocksCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => url_credentials,
        };
        Ok(DialerConfig::Socks5 { proxy, credentials })
    }
}

/// Accept `host:port`, `socks5://[user:pass@]host:port` or `socks5h://...`.
///
/// Both schemes leave name resolution to the proxy; that is the only way `.onion` names resolve.
pub fn parse_socks_proxy(input: &str) -> Result<(String, Option<SocksCredentials>)> {
    let input = input.trim();
    let rest = match input.split_once("://") {
        Some(("socks5" | "socks5h", rest)) => rest,
        Some((scheme, _)) => bail!("unsupported proxy scheme {scheme:?}; expected socks5 or socks5h"),
        None => input,
    };
    let rest = rest.trim_end_matches('/');

    let (credentials, address) = match rest.rsplit_once('@') {
        Some((userinfo, address)) => {
            let Some((username, password)) = userinfo.split_once(':') else {
                bail!("proxy credentials must be given as user:password");
            };
            let credentials = SocksCredentials {
                username: username.to_string(),
                password: password.to_string(),
            };
            (Some(credentials), address)
        }
        None => (None, rest),
    };

    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok((address.to_string(), credentials)),
        _ => bail!("invalid SOCKS proxy address {address:?}; expected host:port"),
    }
}
