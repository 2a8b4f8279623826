// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

#[cfg(test)]
mod tests {
    use crate::config::settings::{parse_proxy_list, Settings, DEFAULT_USER_AGENT};
    use std::io::Write;
    use std::time::Duration;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = Settings::default();

        assert_eq!(settings.scraper.request_delay(), Duration::from_millis(1000));
        assert_eq!(settings.scraper.index_delay(), Duration::from_millis(500));
        assert_eq!(settings.scraper.timeout(), Duration::from_secs(30));
        assert_eq!(settings.scraper.user_agent, DEFAULT_USER_AGENT);
        assert!(settings.scraper.proxy_list.is_empty());
        assert_eq!(settings.limits.max_frame_depth, 3);
        assert_eq!(settings.limits.max_mirrors, 20);
        assert_eq!(settings.limits.max_candidates, 20);
        assert_eq!(settings.limits.max_event_links, 50);
        assert!(settings.browser.enabled);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
[scraper]
request_delay_ms = 250
proxy_list = ["http://a:1", "http://b:2"]

[browser]
enabled = false
"#,
        );

        let settings = Settings::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(settings.scraper.request_delay_ms, 250);
        assert_eq!(settings.scraper.proxy_list.len(), 2);
        assert!(!settings.browser.enabled);
        // Untouched sections fall back to defaults
        assert_eq!(settings.scraper.timeout_ms, 30000);
        assert_eq!(settings.limits.max_frame_depth, 3);
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let file = write_config(
            r#"
[scraper]
timeout_ms = 10
"#,
        );

        let result = Settings::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_proxy_list_skips_blanks() {
        let proxies = parse_proxy_list(" http://a:1 ,, http://b:2,");
        assert_eq!(proxies, vec!["http://a:1", "http://b:2"]);
        assert!(parse_proxy_list("").is_empty());
    }
}
