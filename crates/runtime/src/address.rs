//! Listen address normalisation.
//!
//! Hosts pass whatever they have at hand: `http://0.0.0.0:8000`,
//! `ws://localhost:9000`, `127.0.0.1:8000`, or just a port.

use std::net::{SocketAddr, ToSocketAddrs};

use url::Url;

/// Resolves a listen address to the first matching socket address.
pub fn resolve_listen_address(address: &str) -> Result<SocketAddr, String> {
	let address = address.trim();
	if address.is_empty() {
		return Err("empty address".to_string());
	}

	if let Ok(port) = address.parse::<u16>() {
		return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
	}

	if address.contains("://") {
		let url = Url::parse(address).map_err(|e| e.to_string())?;
		let host = url
			.host_str()
			.ok_or_else(|| format!("no host in '{address}'"))?
			.trim_start_matches('[')
			.trim_end_matches(']')
			.to_string();
		let port = url
			.port_or_known_default()
			.ok_or_else(|| format!("no port in '{address}'"))?;
		return first_addr((host.as_str(), port));
	}

	first_addr(address)
}

fn first_addr<A: ToSocketAddrs>(addr: A) -> Result<SocketAddr, String> {
	addr.to_socket_addrs()
		.map_err(|e| e.to_string())?
		.next()
		.ok_or_else(|| "address resolved to nothing".to_string())
}
