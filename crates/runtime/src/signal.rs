//! Process interrupts, surfaced to the host as "shutdown requested".

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::link::Shared;

pub(crate) fn watch_signals(runtime: &Runtime, shared: Arc<Shared>) {
	runtime.spawn(async move {
		wait_for_signal().await;
		shared.shutdown_requested.store(true, Ordering::SeqCst);
	});
}

#[cfg(unix)]
async fn wait_for_signal() {
	use tokio::signal::unix::{SignalKind, signal};

	let (mut sigterm, mut sigint) = match (
		signal(SignalKind::terminate()),
		signal(SignalKind::interrupt()),
	) {
		(Ok(term), Ok(int)) => (term, int),
		(Err(e), _) | (_, Err(e)) => {
			warn!(target = "wsbridge.runtime", error = %e, "failed to install signal handlers");
			return std::future::pending().await;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => info!(target = "wsbridge.runtime", "received SIGTERM"),
		_ = sigint.recv() => info!(target = "wsbridge.runtime", "received SIGINT"),
	}
}

#[cfg(not(unix))]
async fn wait_for_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => info!(target = "wsbridge.runtime", "received ctrl-c"),
		Err(e) => {
			warn!(target = "wsbridge.runtime", error = %e, "failed to listen for ctrl-c");
			std::future::pending::<()>().await;
		}
	}
}
