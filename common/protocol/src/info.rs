//! Tool-server and coordinator registry records.

use std::collections::BTreeMap;

use bytes::Buf;
use bytes::BufMut;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::wire;

/// A client currently attached to a tool server. Display data only; nothing
/// schedules on it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectedClientInfo {
    pub client_id: String,
    pub client_host: String,
    pub session_id: u64,
    pub used_threads: u16,
}

impl ConnectedClientInfo {
    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        wire::put_string(buf, &self.client_id);
        wire::put_string(buf, &self.client_host);
        buf.put_u64_le(self.session_id);
        buf.put_u16_le(self.used_threads);
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self> {
        Ok(Self {
            client_id: wire::get_string(buf, "client_id")?,
            client_host: wire::get_string(buf, "client_host")?,
            session_id: wire::get_u64(buf, "session_id")?,
            used_threads: wire::get_u16(buf, "used_threads")?,
        })
    }
}

/// One tool server's advertisement: where it listens, how loaded it is and
/// which tools it can run. Published to coordinators on an interval and
/// replaced in place on every publication.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolServerInfo {
    pub host: String,
    pub port: u16,
    pub total_threads: u16,
    pub running_tasks: u16,
    pub queued_tasks: u16,
    pub tool_ids: Vec<String>,
    /// Version string per tool id, as probed on the worker. Clients only
    /// dispatch where these equal their own.
    pub tool_versions: BTreeMap<String, String>,
    pub connected_clients: Vec<ConnectedClientInfo>,
}

impl ToolServerInfo {
    /// Registry key: a worker is identified by where it can be reached.
    pub fn key(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Threads not occupied by running tasks.
    pub fn free_threads(&self) -> u16 {
        self.total_threads.saturating_sub(self.running_tasks)
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        wire::put_string(buf, &self.host);
        buf.put_u16_le(self.port);
        buf.put_u16_le(self.total_threads);
        buf.put_u16_le(self.running_tasks);
        buf.put_u16_le(self.queued_tasks);
        wire::put_string_list(buf, &self.tool_ids);
        wire::put_string_map(buf, &self.tool_versions);
        buf.put_u32_le(self.connected_clients.len() as u32);
        for client in &self.connected_clients {
            client.encode(buf);
        }
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let host = wire::get_string(buf, "host")?;
        let port = wire::get_u16(buf, "port")?;
        let total_threads = wire::get_u16(buf, "total_threads")?;
        let running_tasks = wire::get_u16(buf, "running_tasks")?;
        let queued_tasks = wire::get_u16(buf, "queued_tasks")?;
        let tool_ids = wire::get_string_list(buf, "tool_ids")?;
        let tool_versions = wire::get_string_map(buf, "tool_versions")?;
        let client_count = wire::get_u32(buf, "connected_clients")? as usize;
        let mut connected_clients = Vec::with_capacity(client_count.min(256));
        for _ in 0..client_count {
            connected_clients.push(ConnectedClientInfo::decode(buf)?);
        }
        Ok(Self {
            host,
            port,
            total_threads,
            running_tasks,
            queued_tasks,
            tool_ids,
            tool_versions,
            connected_clients,
        })
    }
}

/// The coordinator's full view: every live tool server, plus an optional
/// free-form operator message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoordinatorInfo {
    pub tool_servers: Vec<ToolServerInfo>,
    pub message: String,
}

impl CoordinatorInfo {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.tool_servers.len() as u32);
        for server in &self.tool_servers {
            server.encode(buf);
        }
        wire::put_string(buf, &self.message);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let count = wire::get_u32(buf, "tool_servers")? as usize;
        let mut tool_servers = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            tool_servers.push(ToolServerInfo::decode(buf)?);
        }
        let message = wire::get_string(buf, "message")?;
        Ok(Self {
            tool_servers,
            message,
        })
    }
}

#[cfg(test)]
#[path = "info.test.rs"]
mod tests;
