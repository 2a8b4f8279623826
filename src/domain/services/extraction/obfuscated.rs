// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{ExtractionStrategy, Markup, MANIFEST_MARKER, MANIFEST_URL_RE};
use crate::utils::errors::DecodeError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;

static BASE64_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9+/]{20,}={0,2}").expect("Failed to compile base64 token regex")
});
static PERCENT_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?%3A%2F%2F[^"'\s<>]+\.m3u8[^"'\s<>]*"#)
        .expect("Failed to compile percent-encoded url regex")
});
static PACKED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)eval\(function\(p,a,c,k,e,d\).*?\}\((.*?)\)\)")
        .expect("Failed to compile packed script regex")
});
static QUOTED_MANIFEST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)['"](https?://[^'"]+\.m3u8[^'"]*)['"]"#)
        .expect("Failed to compile quoted manifest regex")
});
static DECODE_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"atob\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("Failed to compile atob regex")
});
static ASSIGNMENT_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r#"(?i)(?:source|src|stream|url|file|video)\s*[:=]\s*['"]([^'"]*\.m3u8[^'"]*)['"]"#)
            .expect("Failed to compile assignment regex"),
        Regex::new(r#"(?i)['"]([^'"]*\.m3u8[^'"]*)['"]\s*[:=]\s*(?:source|src|stream|url|file|video)"#)
            .expect("Failed to compile reverse assignment regex"),
    ]
});

/// 宽松的 base64 引擎：不要求填充，允许尾部多余位
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// 宽松地解码 base64 文本
///
/// 忽略填充和空白；长度不足一个完整字符时丢弃最后一个字符
pub fn decode_base64_lenient(token: &str) -> Result<String, DecodeError> {
    let mut cleaned: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect();
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }

    let bytes = LENIENT
        .decode(cleaned.as_bytes())
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

/// 解码百分号编码，`%` 后必须跟两位十六进制数
pub fn decode_percent(encoded: &str) -> Result<String, DecodeError> {
    let bytes = encoded.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Err(DecodeError::InvalidPercentEncoding(encoded.to_string()));
            }
        }
    }

    urlencoding::decode(encoded)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| DecodeError::InvalidUtf8)
}

fn is_absolute_http(candidate: &str) -> bool {
    let lower = candidate.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn scan_decoded(decoded: &str) -> impl Iterator<Item = String> + '_ {
    MANIFEST_URL_RE.find_iter(decoded).map(|m| m.as_str().to_string())
}

/// 解码疑似 base64 的长 token 后重新扫描
pub struct Base64TokenScan;

impl ExtractionStrategy for Base64TokenScan {
    fn name(&self) -> &'static str {
        "base64-token"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        let mut found = Vec::new();
        for token in BASE64_TOKEN_RE.find_iter(markup.raw()) {
            match decode_base64_lenient(token.as_str()) {
                Ok(decoded) if decoded.to_ascii_lowercase().contains(MANIFEST_MARKER) => {
                    found.extend(scan_decoded(&decoded));
                }
                // Not base64, or nothing interesting inside
                _ => {}
            }
        }
        found
    }
}

/// 解码百分号编码的地址
pub struct PercentEncodedScan;

impl ExtractionStrategy for PercentEncodedScan {
    fn name(&self) -> &'static str {
        "percent-encoded"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        PERCENT_URL_RE
            .find_iter(markup.raw())
            .filter_map(|m| decode_percent(m.as_str()).ok())
            .collect()
    }
}

/// 在 `eval(function(p,a,c,k,e,d)...)` 压缩脚本中查找带引号的地址
pub struct PackedScriptScan;

impl ExtractionStrategy for PackedScriptScan {
    fn name(&self) -> &'static str {
        "packed-script"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        PACKED_RE
            .find_iter(markup.raw())
            .flat_map(|packed| {
                QUOTED_MANIFEST_RE
                    .captures_iter(packed.as_str())
                    .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// 解码 `atob("...")` 调用的字面量参数
pub struct DecodeCallScan;

impl ExtractionStrategy for DecodeCallScan {
    fn name(&self) -> &'static str {
        "decode-call"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        let mut found = Vec::new();
        for caps in DECODE_CALL_RE.captures_iter(markup.raw()) {
            let Some(arg) = caps.get(1) else { continue };
            if let Ok(decoded) = decode_base64_lenient(arg.as_str()) {
                found.extend(scan_decoded(&decoded));
            }
        }
        found
    }
}

/// 常见的变量赋值写法，`source = "...m3u8"` 及其反向形式
pub struct AssignmentScan;

impl ExtractionStrategy for AssignmentScan {
    fn name(&self) -> &'static str {
        "assignment"
    }

    fn extract(&self, markup: &Markup<'_>) -> Vec<String> {
        ASSIGNMENT_RES
            .iter()
            .flat_map(|re| {
                re.captures_iter(markup.raw())
                    .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                    .collect::<Vec<_>>()
            })
            .filter(|candidate| is_absolute_http(candidate))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use url::Url;

    fn run(strategy: &dyn ExtractionStrategy, html: &str) -> Vec<String> {
        let base = Url::parse("https://site.test/page").unwrap();
        strategy.extract(&Markup::new(html, &base))
    }

    #[test]
    fn test_lenient_base64_tolerates_missing_padding() {
        let encoded = STANDARD.encode("https://cdn.test/ab.m3u8");
        let unpadded = encoded.trim_end_matches('=');
        assert_eq!(
            decode_base64_lenient(unpadded).unwrap(),
            "https://cdn.test/ab.m3u8"
        );
    }

    #[test]
    fn test_lenient_base64_rejects_binary() {
        let encoded = STANDARD.encode([0xff_u8, 0xfe, 0xfd, 0x00, 0x81, 0x82]);
        assert_eq!(decode_base64_lenient(&encoded), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_decode_percent_rejects_malformed_sequences() {
        assert_eq!(
            decode_percent("https%3A%2F%2Fa.test%2Fx.m3u8").unwrap(),
            "https://a.test/x.m3u8"
        );
        assert!(matches!(
            decode_percent("https%3A%2F%2Fa.test%ZZx.m3u8"),
            Err(DecodeError::InvalidPercentEncoding(_))
        ));
        assert!(matches!(decode_percent("bad%E"), Err(_)));
    }

    #[test]
    fn test_base64_scan_skips_garbage_tokens() {
        let good = STANDARD.encode("https://cdn.test/one.m3u8");
        let html = format!(
            "<p>/usr/local/share/some/very/long/path/segment</p><script>x='{}'</script>",
            good
        );
        let found = run(&Base64TokenScan, &html);
        assert_eq!(found, vec!["https://cdn.test/one.m3u8"]);
    }

    #[test]
    fn test_packed_script_payload() {
        let html = r#"<script>eval(function(p,a,c,k,e,d){return p}('0 1',2,2,'var|"https://cdn.test/packed.m3u8"'.split('|'),0,{}))</script>"#;
        let found = run(&PackedScriptScan, html);
        assert_eq!(found, vec!["https://cdn.test/packed.m3u8"]);
    }

    #[test]
    fn test_decode_call_with_invalid_argument_is_skipped() {
        let good = STANDARD.encode("https://cdn.test/atob.m3u8");
        let html = format!(r#"atob("!!!notbase64!!!"); player.load(atob('{}'));"#, good);
        let found = run(&DecodeCallScan, &html);
        assert_eq!(found, vec!["https://cdn.test/atob.m3u8"]);
    }

    #[test]
    fn test_assignment_in_both_orders() {
        let html = r#"
            var source = "https://cdn.test/forward.m3u8";
            {"https://cdn.test/reverse.m3u8": src}
            file: "/relative/only.m3u8"
        "#;
        let found = run(&AssignmentScan, html);
        assert!(found.contains(&"https://cdn.test/forward.m3u8".to_string()));
        assert!(found.contains(&"https://cdn.test/reverse.m3u8".to_string()));
        assert_eq!(found.len(), 2);
    }
}
