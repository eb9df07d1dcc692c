// Device cache
//
// Caching proxy over the JSON client: a mapping from device name to
// last-known key/value state, combined with on-demand network refresh.
// Built entirely on the request helpers in client.rs; never touches the
// transport directly.

use std::collections::HashSet;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::client::{ClientConfig, JsonClient};
use crate::decode::from_value;
use crate::device::{CommandReply, Device, DeviceReply, DeviceType};
use crate::error::Error;

const NO_ARGS: &[(&str, &str)] = &[];

/// Client with a managed cache of device values.
///
/// The cache is consistent with the server only immediately after a
/// [`refresh`](Self::refresh); entries may otherwise stay stale
/// indefinitely. Each entry write is atomic, but concurrent refreshes
/// of overlapping devices race with last-writer-wins and no ordering
/// guarantee.
pub struct DeviceProxy {
    client: JsonClient,
    devices: DashMap<String, Device>,
}

impl DeviceProxy {
    /// Build a proxy with a fresh client. The cache starts empty.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        Ok(Self::with_client(JsonClient::new(config)?))
    }

    /// Build a proxy around an already-constructed client.
    pub fn with_client(client: JsonClient) -> Self {
        Self {
            client,
            devices: DashMap::new(),
        }
    }

    /// The underlying client, for raw requests outside the cache.
    pub fn client(&self) -> &JsonClient {
        &self.client
    }

    /// Refresh one device, or resynchronize the whole cache.
    ///
    /// With a device name, only that entry is fetched and overwritten.
    /// With `None`, the device list and every device's full state are
    /// fetched into a staging set first and committed only when all
    /// fetches succeeded; on failure the cache keeps its previous
    /// contents. The commit upserts incoming entries, then prunes names
    /// the server no longer reports.
    pub async fn refresh(&self, device: Option<&str>) -> Result<(), Error> {
        match device {
            Some(name) => {
                let device = self.fetch_device(name).await?;
                self.devices.insert(name.to_owned(), device);
            }
            None => {
                let names: Vec<String> =
                    from_value(&self.client.fetch_json("/api/devices", NO_ARGS).await?)?;
                debug!(count = names.len(), "full cache refresh");

                let mut staged = Vec::with_capacity(names.len());
                for name in names {
                    let device = self.fetch_device(&name).await?;
                    staged.push((name, device));
                }

                let incoming: HashSet<String> =
                    staged.iter().map(|(name, _)| name.clone()).collect();
                for (name, device) in staged {
                    self.devices.insert(name, device);
                }
                self.devices.retain(|name, _| incoming.contains(name));
            }
        }
        Ok(())
    }

    /// The device's current state value, always freshly fetched.
    pub async fn get_state(&self, device: &str) -> Result<Value, Error> {
        let reply = self.client.fetch_json("/api/get", &[("d", device)]).await?;
        let reply: DeviceReply = from_value(&reply)?;
        Ok(reply.state)
    }

    /// Look up a cached device value.
    ///
    /// On a miss with `refresh_not_found` set, the device is refreshed
    /// once and the lookup retried once; a second miss is authoritative
    /// and fails with [`Error::NotFound`].
    pub async fn get_value(
        &self,
        device: &str,
        name: &str,
        refresh_not_found: bool,
    ) -> Result<Value, Error> {
        if let Some(value) = self.cached_value(device, name) {
            return Ok(value);
        }
        if !refresh_not_found {
            return Err(not_found(device, name));
        }

        self.refresh(Some(device)).await?;
        self.cached_value(device, name)
            .ok_or_else(|| not_found(device, name))
    }

    /// [`get_value`](Self::get_value) narrowed to a number.
    pub async fn get_value_f64(
        &self,
        device: &str,
        name: &str,
        refresh_not_found: bool,
    ) -> Result<f64, Error> {
        let value = self.get_value(device, name, refresh_not_found).await?;
        value.as_f64().ok_or_else(|| Error::Decode {
            message: format!("{device}.{name} is not a number"),
            body: value.to_string(),
        })
    }

    /// Set a single device value.
    ///
    /// The cache entry is not updated; refresh or re-read to observe the
    /// change. `queue` names an asynchronous value queue on the daemon.
    pub async fn set_value(
        &self,
        device: &str,
        name: &str,
        value: impl ToString,
        queue: Option<&str>,
    ) -> Result<(), Error> {
        let mut args = vec![
            ("d", device.to_owned()),
            ("n", name.to_owned()),
            ("v", value.to_string()),
        ];
        if let Some(queue) = queue {
            args.push(("async", queue.to_owned()));
        }
        self.client.fetch_json("/api/set", &args).await?;
        Ok(())
    }

    /// Set several values in one request.
    ///
    /// With a device given, every key is namespaced as `"<device>.<key>"`
    /// (the daemon's convention); otherwise keys are sent as-is and must
    /// already be fully qualified. No cache update.
    pub async fn set_values(
        &self,
        values: &[(&str, String)],
        device: Option<&str>,
        queue: Option<&str>,
    ) -> Result<(), Error> {
        let mut args: Vec<(String, String)> = values
            .iter()
            .map(|(name, value)| {
                let key = match device {
                    Some(device) => format!("{device}.{name}"),
                    None => (*name).to_owned(),
                };
                (key, value.clone())
            })
            .collect();
        if let Some(queue) = queue {
            args.push(("async".to_owned(), queue.to_owned()));
        }
        self.client.fetch_json("/api/mset", &args).await?;
        Ok(())
    }

    /// Run a device command and return its declared return value.
    ///
    /// The reply carries the device's full post-command state, which
    /// overwrites the cache entry -- the only operation with an automatic
    /// cache write.
    pub async fn execute_command(&self, device: &str, command: &str) -> Result<Value, Error> {
        let reply = self
            .client
            .fetch_json("/api/cmd", &[("d", device), ("c", command), ("e", "1")])
            .await?;
        let CommandReply { d, state, ret } = from_value(&reply)?;

        debug!(device, command, "command executed, cache entry replaced");
        self.devices
            .insert(device.to_owned(), Device { values: d, state });
        Ok(ret)
    }

    /// Names of all devices of one kind. Pass-through query; the cache
    /// is not consulted or updated.
    pub async fn get_devices_by_type(&self, device_type: DeviceType) -> Result<Vec<String>, Error> {
        let reply = self
            .client
            .fetch_json("/api/devbytype", &[("t", device_type.code().to_string())])
            .await?;
        from_value(&reply)
    }

    /// Snapshot of a cached device entry, if present.
    pub fn cached_device(&self, device: &str) -> Option<Device> {
        self.devices.get(device).map(|entry| entry.value().clone())
    }

    /// A cached value, without any network access.
    pub fn cached_value(&self, device: &str, name: &str) -> Option<Value> {
        self.devices
            .get(device)
            .and_then(|entry| entry.values.get(name).cloned())
    }

    /// Names currently present in the cache.
    pub fn device_names(&self) -> Vec<String> {
        self.devices.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn fetch_device(&self, name: &str) -> Result<Device, Error> {
        let reply = self.client.fetch_json("/api/get", &[("d", name)]).await?;
        let reply: DeviceReply = from_value(&reply)?;
        Ok(reply.into())
    }
}

fn not_found(device: &str, value: &str) -> Error {
    Error::NotFound {
        device: device.to_owned(),
        value: value.to_owned(),
    }
}
