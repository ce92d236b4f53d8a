use axum::http::HeaderMap;
use bifrost_core::McpRequestOptions;

const INCLUDE_CLIENTS: &str = "x-bf-mcp-include-clients";
const EXCLUDE_CLIENTS: &str = "x-bf-mcp-exclude-clients";
const INCLUDE_TOOLS: &str = "x-bf-mcp-include-tools";
const EXCLUDE_TOOLS: &str = "x-bf-mcp-exclude-tools";

/// Translates the `X-BF-MCP-*` request-scoped control headers into
/// an explicit [`McpRequestOptions`] record at the HTTP boundary.
pub fn parse(headers: &HeaderMap) -> McpRequestOptions {
    McpRequestOptions {
        include_clients: comma_list(headers, INCLUDE_CLIENTS),
        exclude_clients: comma_list(headers, EXCLUDE_CLIENTS),
        include_tools: comma_list(headers, INCLUDE_TOOLS),
        exclude_tools: comma_list(headers, EXCLUDE_TOOLS),
    }
}

fn comma_list(headers: &HeaderMap, name: &str) -> Vec<String> {
    let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
        return Vec::new();
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_comma_separated_lists_and_trims_whitespace() {
        let mut headers = HeaderMap::new();
        headers.insert(INCLUDE_TOOLS, HeaderValue::from_static(" search , fetch_url "));
        let options = parse(&headers);
        assert_eq!(options.include_tools, vec!["search", "fetch_url"]);
        assert!(options.exclude_tools.is_empty());
    }

    #[test]
    fn missing_headers_yield_empty_lists() {
        let options = parse(&HeaderMap::new());
        assert_eq!(options, McpRequestOptions::default());
    }
}
