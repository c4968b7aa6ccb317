//! Text and JSON renderers for the status tool.

use std::collections::BTreeMap;

use distbuild_protocol::ToolServerInfo;

/// Tool id -> host -> version, for tools whose version differs between
/// hosts.
pub type ConflictMap = BTreeMap<String, BTreeMap<String, String>>;

/// One output format for the status tool. The tool drives the writer as
/// results arrive and calls [`StatusWriter::finish`] once at the end.
pub trait StatusWriter {
    fn message(&mut self, text: &str);
    fn tool_server(&mut self, info: &ToolServerInfo);
    fn tool_versions(&mut self, host: &str, versions: &BTreeMap<String, String>);
    fn conflicts(&mut self, conflicts: &ConflictMap);
    fn finish(&mut self);
}

/// Human-readable table output.
#[derive(Default)]
pub struct TextWriter;

impl StatusWriter for TextWriter {
    fn message(&mut self, text: &str) {
        println!("{text}");
    }

    fn tool_server(&mut self, info: &ToolServerInfo) {
        println!(
            "{}:{}  threads {}/{} (queued {})  tools [{}]",
            info.host,
            info.port,
            info.running_tasks,
            info.total_threads,
            info.queued_tasks,
            info.tool_ids.join(", ")
        );
        for client in &info.connected_clients {
            println!(
                "    client {} ({}) session {:x} using {} threads",
                client.client_id, client.client_host, client.session_id, client.used_threads
            );
        }
    }

    fn tool_versions(&mut self, host: &str, versions: &BTreeMap<String, String>) {
        for (tool, version) in versions {
            let shown = if version.is_empty() { "-" } else { version };
            println!("  {host}: {tool} = {shown}");
        }
    }

    fn conflicts(&mut self, conflicts: &ConflictMap) {
        if conflicts.is_empty() {
            return;
        }
        println!("version conflicts:");
        for (tool, hosts) in conflicts {
            println!("  {tool}:");
            for (host, version) in hosts {
                println!("    {host} = {version}");
            }
        }
    }

    fn finish(&mut self) {}
}

/// Machine-readable output: one JSON document on stdout.
#[derive(Default)]
pub struct JsonWriter {
    message: String,
    tool_servers: Vec<serde_json::Value>,
    versions: BTreeMap<String, BTreeMap<String, String>>,
    conflicts: serde_json::Value,
}

impl StatusWriter for JsonWriter {
    fn message(&mut self, text: &str) {
        self.message = text.to_string();
    }

    fn tool_server(&mut self, info: &ToolServerInfo) {
        if let Ok(value) = serde_json::to_value(info) {
            self.tool_servers.push(value);
        }
    }

    fn tool_versions(&mut self, host: &str, versions: &BTreeMap<String, String>) {
        self.versions.insert(host.to_string(), versions.clone());
    }

    fn conflicts(&mut self, conflicts: &ConflictMap) {
        self.conflicts = serde_json::json!(conflicts);
    }

    fn finish(&mut self) {
        let document = serde_json::json!({
            "message": self.message,
            "tool_servers": self.tool_servers,
            "versions": self.versions,
            "conflicts": self.conflicts,
        });
        println!("{document:#}");
    }
}

/// Cross-compare collected versions and keep the tools that disagree.
pub fn find_conflicts(all_versions: &BTreeMap<String, BTreeMap<String, String>>) -> ConflictMap {
    let mut by_tool: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for (host, versions) in all_versions {
        for (tool, version) in versions {
            by_tool
                .entry(tool.clone())
                .or_default()
                .insert(host.clone(), version.clone());
        }
    }
    by_tool
        .into_iter()
        .filter(|(_, hosts)| {
            let mut distinct = hosts.values().collect::<Vec<_>>();
            distinct.sort();
            distinct.dedup();
            distinct.len() > 1
        })
        .collect()
}

#[cfg(test)]
#[path = "status_writer.test.rs"]
mod tests;
