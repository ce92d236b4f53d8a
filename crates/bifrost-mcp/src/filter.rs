use std::collections::BTreeSet;

use bifrost_core::McpRequestOptions;

/// Per-client filter configuration consulted by [`resolve_tool`]: the
/// per-client whitelist/blacklist from `ClientConfig`.
pub struct ClientFilter<'a> {
    pub tools_to_execute: &'a BTreeSet<String>,
    pub skip_tools: &'a BTreeSet<String>,
}

/// Applies the four-level filter priority from lowest to highest: each later
/// rule overrides the decision made by the ones before it, in either
/// direction — a name present in the highest-priority non-empty list always
/// wins, even over a lower-priority rule that would have excluded it.
///
/// Priority, lowest to highest:
/// 1. per-client skip-list
/// 2. per-client tools-to-execute whitelist
/// 3. request-level exclude-tools
/// 4. request-level include-tools
pub fn resolve_tool(tool_name: &str, client: Option<&ClientFilter<'_>>, request: &McpRequestOptions) -> bool {
    let mut included = true;

    if let Some(client) = client {
        if client.skip_tools.contains(tool_name) {
            included = false;
        }
        if !client.tools_to_execute.is_empty() {
            included = client.tools_to_execute.contains(tool_name);
        }
    }

    if !request.exclude_tools.is_empty() && request.exclude_tools.iter().any(|t| t == tool_name) {
        included = false;
    }
    if !request.include_tools.is_empty() {
        included = request.include_tools.iter().any(|t| t == tool_name);
    }

    included
}

/// Request-level client gate: include-clients dominates
/// exclude-clients; a tool with no owning client (a local tool) always
/// passes this gate since it isn't sourced from any client.
pub fn resolve_client(client_name: Option<&str>, request: &McpRequestOptions) -> bool {
    let Some(client_name) = client_name else {
        return true;
    };

    let mut included = true;
    if !request.exclude_clients.is_empty() && request.exclude_clients.iter().any(|c| c == client_name) {
        included = false;
    }
    if !request.include_clients.is_empty() {
        included = request.include_clients.iter().any(|c| c == client_name);
    }
    included
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_request_filters() -> McpRequestOptions {
        McpRequestOptions::default()
    }

    fn client_filter<'a>(whitelist: &'a BTreeSet<String>, blacklist: &'a BTreeSet<String>) -> ClientFilter<'a> {
        ClientFilter {
            tools_to_execute: whitelist,
            skip_tools: blacklist,
        }
    }

    #[test]
    fn no_restrictions_allows_all() {
        assert!(resolve_tool("search", None, &no_request_filters()));
    }

    #[test]
    fn per_client_skip_list_excludes() {
        let skip = BTreeSet::from(["search".to_string()]);
        let allow = BTreeSet::new();
        let filter = client_filter(&allow, &skip);
        assert!(!resolve_tool("search", Some(&filter), &no_request_filters()));
        assert!(resolve_tool("other", Some(&filter), &no_request_filters()));
    }

    #[test]
    fn whitelist_overrides_skip_list() {
        let skip = BTreeSet::from(["search".to_string()]);
        let allow = BTreeSet::from(["search".to_string()]);
        let filter = client_filter(&allow, &skip);
        assert!(resolve_tool("search", Some(&filter), &no_request_filters()));
        assert!(!resolve_tool("other", Some(&filter), &no_request_filters()));
    }

    #[test]
    fn request_exclude_beats_per_client_whitelist() {
        let allow = BTreeSet::from(["search".to_string()]);
        let skip = BTreeSet::new();
        let filter = client_filter(&allow, &skip);
        let request = McpRequestOptions {
            exclude_tools: vec!["search".to_string()],
            ..Default::default()
        };
        assert!(!resolve_tool("search", Some(&filter), &request));
    }

    #[test]
    fn request_include_beats_everything_below_it() {
        let skip = BTreeSet::from(["search".to_string()]);
        let allow = BTreeSet::new();
        let filter = client_filter(&allow, &skip);
        let request = McpRequestOptions {
            include_tools: vec!["search".to_string()],
            exclude_tools: vec!["search".to_string()],
            ..Default::default()
        };
        assert!(resolve_tool("search", Some(&filter), &request));
    }

    #[test]
    fn request_include_tools_excludes_unlisted_names() {
        let request = McpRequestOptions {
            include_tools: vec!["search".to_string()],
            ..Default::default()
        };
        assert!(!resolve_tool("unrelated", None, &request));
    }

    #[test]
    fn local_tool_always_passes_client_gate() {
        assert!(resolve_client(
            None,
            &McpRequestOptions {
                include_clients: vec!["only-this-one".to_string()],
                ..Default::default()
            }
        ));
    }

    #[test]
    fn client_gate_include_dominates_exclude() {
        let request = McpRequestOptions {
            include_clients: vec!["docs".to_string()],
            exclude_clients: vec!["docs".to_string()],
            ..Default::default()
        };
        assert!(resolve_client(Some("docs"), &request));
    }

    #[test]
    fn client_gate_exclude_blocks_when_not_included() {
        let request = McpRequestOptions {
            exclude_clients: vec!["docs".to_string()],
            ..Default::default()
        };
        assert!(!resolve_client(Some("docs"), &request));
        assert!(resolve_client(Some("other"), &request));
    }
}
