//! Public IP address segment, backed by api.ipify.org.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::Segment;
use crate::cache::Ttl;
use crate::env::{Environment, HttpError};
use crate::properties::{
    CACHE_DURATION, DEFAULT_CACHE_DURATION, DEFAULT_HTTP_TIMEOUT, HTTP_TIMEOUT, Properties,
};

const IPIFY_URL: &str = "https://api.ipify.org?format=json";
const CACHE_KEY: &str = "ipify:ip";

/// Shown instead of an address when the API host can't be resolved.
pub const OFFLINE: &str = "OFFLINE";

#[derive(Debug, Deserialize)]
struct IpData {
    ip: String,
}

pub struct Ipify {
    props: Properties,
    env: Arc<dyn Environment>,
    pub ip: String,
}

impl Ipify {
    fn fetch(&self) -> Result<String, HttpError> {
        let timeout = self.props.get_int(HTTP_TIMEOUT, DEFAULT_HTTP_TIMEOUT);
        let timeout = Duration::from_millis(u64::try_from(timeout).unwrap_or(0));

        let body = self.env.http_get(IPIFY_URL, timeout)?;
        let data: IpData = serde_json::from_slice(&body)
            .map_err(|e| HttpError::Transport(format!("unexpected response: {e}")))?;
        Ok(data.ip)
    }

    fn cache_ttl(&self) -> Ttl {
        let minutes = self.props.get_int(CACHE_DURATION, DEFAULT_CACHE_DURATION);
        Ttl::Minutes(u64::try_from(minutes).unwrap_or(0))
    }
}

impl Segment for Ipify {
    fn new(props: Properties, env: Arc<dyn Environment>) -> Self {
        Self {
            props,
            env,
            ip: String::new(),
        }
    }

    fn enabled(&mut self) -> bool {
        let ttl = self.cache_ttl();
        if ttl != Ttl::Minutes(0)
            && let Some(ip) = self.env.cache().get(CACHE_KEY)
        {
            self.ip = ip;
            return true;
        }

        match self.fetch() {
            Ok(ip) if !ip.is_empty() => {
                self.env.cache().set(CACHE_KEY, &ip, ttl);
                self.ip = ip;
                true
            }
            Ok(_) => false,
            Err(HttpError::Offline) => {
                self.ip = OFFLINE.to_string();
                true
            }
            Err(e) => {
                log::debug!("ipify: {}", e);
                false
            }
        }
    }

    fn template(&self) -> &'static str {
        " {{ ip }} "
    }

    fn fields(&self) -> minijinja::Value {
        minijinja::context! { ip => self.ip }
    }
}
