//! Power management via the `UPower` `DBus` service.
//!
//! Fire-and-forget: the session never checks a return value, it only logs
//! failures.

use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use zbus::Connection;

const UPOWER_SERVICE: &str = "org.freedesktop.UPower";
const UPOWER_PATH: &str = "/org/freedesktop/UPower";
const UPOWER_INTERFACE: &str = "org.freedesktop.UPower";

/// Power-management collaborator.
#[async_trait]
pub trait PowerManager: Send + Sync {
    async fn suspend(&self);
    async fn hibernate(&self);
}

/// `PowerManager` backed by `org.freedesktop.UPower` on the system bus.
pub struct UPowerManager;

impl UPowerManager {
    async fn call(&self, method: &str) -> Result<()> {
        let conn = Connection::system()
            .await
            .context("Failed to connect to system DBus")?;

        let proxy = zbus::Proxy::new(&conn, UPOWER_SERVICE, UPOWER_PATH, UPOWER_INTERFACE)
            .await
            .context("Failed to create UPower proxy")?;

        proxy
            .call_noreply(method, &())
            .await
            .with_context(|| format!("UPower {method} call failed"))?;

        debug!("UPower {} requested", method);
        Ok(())
    }
}

#[async_trait]
impl PowerManager for UPowerManager {
    async fn suspend(&self) {
        if let Err(err) = self.call("Suspend").await {
            error!("suspend request failed: {:#}", err);
        }
    }

    async fn hibernate(&self) {
        if let Err(err) = self.call("Hibernate").await {
            error!("hibernate request failed: {:#}", err);
        }
    }
}
