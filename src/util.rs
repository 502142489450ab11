use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const EXPORTER_PORT: &str = "EXPORTER_PORT";

const DEFAULT_PORT: u16 = 9100;

pub fn get_default_port() -> u16 {
    DEFAULT_PORT
}

pub fn get_port() -> u16 {
    parse_or(std::env::var(EXPORTER_PORT).ok().as_deref(), DEFAULT_PORT)
}

const EXPORTER_ADDR: &str = "EXPORTER_ADDR";

const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

pub fn get_addr() -> IpAddr {
    parse_or(std::env::var(EXPORTER_ADDR).ok().as_deref(), DEFAULT_ADDR)
}

/// Listen address from the environment, falling back to `0.0.0.0:9100`
pub fn get_listen_address() -> SocketAddr {
    SocketAddr::new(get_addr(), get_port())
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    match value.and_then(|res| res.trim().parse().ok()) {
        Some(parsed) => parsed,
        None => default,
    }
}
