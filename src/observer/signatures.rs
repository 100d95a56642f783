// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Static signature knowledge base.
//!
//! Patterns are plain strings here and compiled case-insensitively on first
//! use. A pattern that fails to compile is dropped, so it can never match.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

pub struct ErrorSignature {
    pub label: &'static str,
    pub patterns: &'static [&'static str],
    pub confidence: f64,
}

pub const ERROR_SIGNATURES: &[ErrorSignature] = &[
    ErrorSignature {
        label: "extension_blocked",
        patterns: &[
            r"invalid file type",
            r"file type not allowed",
            r"only.*allowed",
            r"extension.*not permitted",
            r"extension.*not supported",
            r"file extension.*invalid",
            r"unsupported file type",
            r"prohibited file type",
        ],
        confidence: 0.9,
    },
    ErrorSignature {
        label: "mime_type_rejected",
        patterns: &[
            r"invalid mime type",
            r"content-type.*not allowed",
            r"mime.*not supported",
            r"wrong content type",
        ],
        confidence: 0.85,
    },
    ErrorSignature {
        label: "size_limit",
        patterns: &[
            r"file too large",
            r"exceeds.*size limit",
            r"maximum file size",
            r"file.*too big",
        ],
        confidence: 0.95,
    },
    ErrorSignature {
        label: "upload_success",
        patterns: &[
            r"successfully uploaded",
            r"file uploaded",
            r"has been uploaded",
            r"upload.*success",
            r"file.*saved",
            r"upload complete",
        ],
        confidence: 0.9,
    },
];

pub struct WafSignature {
    pub vendor: &'static str,
    pub headers: &'static [&'static str],
    pub status_codes: &'static [u16],
    pub body_patterns: &'static [&'static str],
    pub bypass_techniques: &'static [&'static str],
    pub confidence_boost: f64,
}

pub const WAF_SIGNATURES: &[WafSignature] = &[
    WafSignature {
        vendor: "ModSecurity",
        headers: &[r"X-ModSecurity", r"X-OWASP-ModSecurity"],
        status_codes: &[406, 501],
        body_patterns: &[
            r"mod_security",
            r"ModSecurity",
            r"This request has been blocked",
            r"OWASP ModSecurity Core Rule Set",
            r"406 Not Acceptable",
        ],
        bypass_techniques: &["encoding", "case_variation", "null_byte", "fragmentation"],
        confidence_boost: 0.9,
    },
    WafSignature {
        vendor: "Cloudflare",
        headers: &[r"CF-RAY", r"CF-Cache-Status", r"__cfduid", r"cf-request-id"],
        status_codes: &[403, 1020, 1010],
        body_patterns: &[r"cloudflare", r"Attention Required", r"Error 1020", r"Ray ID", r"cf-ray"],
        bypass_techniques: &["origin_ip", "encoding", "fragmentation"],
        confidence_boost: 0.95,
    },
    WafSignature {
        vendor: "AWS WAF",
        headers: &[r"X-AMZ-CF-ID", r"X-AMZ-ID", r"X-Amzn-RequestId"],
        status_codes: &[403],
        body_patterns: &[r"AWS WAF", r"Access Denied", r"RequestId", r"X-Amz"],
        bypass_techniques: &["encoding", "case_variation"],
        confidence_boost: 0.85,
    },
    WafSignature {
        vendor: "Imperva",
        headers: &[r"X-Iinfo", r"X-CDN", r"Set-Cookie.*visid_incap"],
        status_codes: &[403],
        body_patterns: &[r"Incapsula", r"Imperva", r"Access Denied", r"incapsula"],
        bypass_techniques: &["encoding", "time_delay", "fragmentation"],
        confidence_boost: 0.9,
    },
    WafSignature {
        vendor: "Akamai",
        headers: &[r"X-Akamai-Request-ID", r"Akamai-Origin-Hop"],
        status_codes: &[403],
        body_patterns: &[r"Akamai", r"Access Denied", r"Reference #"],
        bypass_techniques: &["origin_ip", "encoding"],
        confidence_boost: 0.85,
    },
    WafSignature {
        vendor: "F5 BIG-IP",
        headers: &[r"X-WA-Info", r"BigIP", r"X-Cnection"],
        status_codes: &[403],
        body_patterns: &[r"F5", r"BigIP", r"Access Denied", r"The requested URL was rejected"],
        bypass_techniques: &["encoding", "case_variation"],
        confidence_boost: 0.8,
    },
];

pub struct ServerSignature {
    pub name: &'static str,
    /// Tried in order; a first capture group is the version.
    pub patterns: &'static [&'static str],
}

pub const SERVER_SIGNATURES: &[ServerSignature] = &[
    ServerSignature {
        name: "Apache",
        patterns: &[r"Apache/([\d.]+)", r"^Apache"],
    },
    ServerSignature {
        name: "Nginx",
        patterns: &[r"nginx/([\d.]+)", r"^nginx"],
    },
    ServerSignature {
        name: "IIS",
        patterns: &[r"Microsoft-IIS/([\d.]+)", r"Microsoft-IIS"],
    },
    ServerSignature {
        name: "LiteSpeed",
        patterns: &[r"LiteSpeed/([\d.]+)", r"^LiteSpeed"],
    },
];

pub struct LanguageSignature {
    pub name: &'static str,
    /// Matched against `name: value` header lines.
    pub header_patterns: &'static [&'static str],
    pub body_patterns: &'static [&'static str],
    pub error_patterns: &'static [&'static str],
}

pub const LANGUAGE_SIGNATURES: &[LanguageSignature] = &[
    LanguageSignature {
        name: "PHP",
        header_patterns: &[r"X-Powered-By: PHP/([\d.]+)", r"Set-Cookie: PHPSESSID="],
        body_patterns: &[r"<\?php", r"Fatal error.*PHP", r"Warning.*PHP", r"Parse error.*PHP"],
        error_patterns: &[r"PHP Warning", r"PHP Fatal error", r"PHP Parse error"],
    },
    LanguageSignature {
        name: "Java",
        header_patterns: &[r"X-Powered-By: Servlet", r"JSESSIONID"],
        body_patterns: &[r"<%@", r"javax\.", r"java\."],
        error_patterns: &[r"java\.lang\.", r"javax\.servlet\."],
    },
    LanguageSignature {
        name: "ASP.NET",
        header_patterns: &[r"X-AspNet-Version", r"X-Powered-By: ASP\.NET", r"ASP\.NET_SessionId"],
        body_patterns: &[r"<%@", r"__VIEWSTATE"],
        error_patterns: &[r"System\.Web\.", r"Microsoft\.AspNetCore\."],
    },
];

pub const ERROR_VERSION_PATTERN: &str = r"(\d+\.\d+\.\d+)";

pub struct FrameworkSignature {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
}

pub const FRAMEWORK_SIGNATURES: &[FrameworkSignature] = &[
    FrameworkSignature {
        name: "Laravel",
        patterns: &[r"laravel_session", r"Laravel", r"Illuminate\\"],
    },
    FrameworkSignature {
        name: "Symfony",
        patterns: &[r"Symfony", r"symfony/"],
    },
    FrameworkSignature {
        name: "Spring",
        patterns: &[r"Spring Framework", r"springframework"],
    },
    FrameworkSignature {
        name: "Express",
        patterns: &[r"X-Powered-By: Express", r"Express"],
    },
];

pub struct OsSignature {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    pub version_pattern: Option<&'static str>,
}

pub const OS_SIGNATURES: &[OsSignature] = &[
    OsSignature {
        name: "Linux",
        patterns: &[
            r"/usr/bin",
            r"/var/www",
            r"/etc/",
            r"/home/",
            r"Linux",
            r"Ubuntu",
            r"Debian",
            r"CentOS",
        ],
        version_pattern: Some(r"(?:Ubuntu|Debian|CentOS|Linux)[\s/](\d+\.?\d*)"),
    },
    OsSignature {
        name: "Windows",
        patterns: &[
            r"C:\\Windows",
            r"C:\\Program Files",
            r"\\WINDOWS\\",
            r"Microsoft-IIS",
            r"ASP\.NET",
        ],
        version_pattern: None,
    },
];

/// Markers that the uploaded source came back unexecuted.
pub const SOURCE_VISIBLE_MARKERS: &[&str] = &[r"<\?php", r"<%@", r"<%"];

pub const LINUX_FILE_INDICATORS: &[&str] = &[
    r"root:x:0:0",
    r"daemon:x:",
    r"/bin/bash",
    r"/bin/sh",
    r"Linux version",
    r"www-data:",
];

pub const WINDOWS_FILE_INDICATORS: &[&str] = &[
    r"\[boot loader\]",
    r"Windows Registry",
    r"Microsoft Windows",
    r"C:\\Windows",
];

pub const EXECUTION_MARKERS: &[&str] = &["EXEC_OK", "EXECUTED"];

/// Public directories uploads commonly land in; the filename follows.
pub const UPLOAD_DIRECTORIES: &[&str] = &[
    "/files/avatars/",
    "/files/uploads/",
    "/static/uploads/",
    "/assets/uploads/",
    "/user/uploads/",
    "/uploads/",
    "/upload/",
    "/media/",
    "/avatar/",
    "/profile/",
];

/// Attribute references whose first group is a full upload path.
pub const UPLOAD_REFERENCE_PATTERNS: &[&str] = &[
    r#"src="([^"]*uploads[^"]*)""#,
    r#"href="([^"]*uploads[^"]*)""#,
    r#"src="([^"]*avatars[^"]*)""#,
];

/// Compile a pattern case-insensitively; `None` when it is invalid.
pub fn compile(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

pub fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| compile(p)).collect()
}

pub struct CompiledError {
    pub label: &'static str,
    pub confidence: f64,
    pub patterns: Vec<Regex>,
}

pub struct CompiledWaf {
    pub signature: &'static WafSignature,
    pub headers: Vec<(&'static str, Regex)>,
    pub body: Vec<(&'static str, Regex)>,
}

pub struct CompiledLanguage {
    pub name: &'static str,
    pub headers: Vec<Regex>,
    pub body: Vec<Regex>,
    pub errors: Vec<Regex>,
}

pub static ERROR_RULES: Lazy<Vec<CompiledError>> = Lazy::new(|| {
    ERROR_SIGNATURES
        .iter()
        .map(|sig| CompiledError {
            label: sig.label,
            confidence: sig.confidence,
            patterns: compile_all(sig.patterns),
        })
        .collect()
});

pub static WAF_RULES: Lazy<Vec<CompiledWaf>> = Lazy::new(|| {
    fn labelled(patterns: &[&'static str]) -> Vec<(&'static str, Regex)> {
        patterns
            .iter()
            .filter_map(|p| compile(p).map(|re| (*p, re)))
            .collect()
    }

    WAF_SIGNATURES
        .iter()
        .map(|sig| CompiledWaf {
            signature: sig,
            headers: labelled(sig.headers),
            body: labelled(sig.body_patterns),
        })
        .collect()
});

pub static SERVER_RULES: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    SERVER_SIGNATURES
        .iter()
        .map(|sig| (sig.name, compile_all(sig.patterns)))
        .collect()
});

pub static LANGUAGE_RULES: Lazy<Vec<CompiledLanguage>> = Lazy::new(|| {
    LANGUAGE_SIGNATURES
        .iter()
        .map(|sig| CompiledLanguage {
            name: sig.name,
            headers: compile_all(sig.header_patterns),
            body: compile_all(sig.body_patterns),
            errors: compile_all(sig.error_patterns),
        })
        .collect()
});

pub static FRAMEWORK_RULES: Lazy<Vec<(&'static str, Vec<Regex>, Option<Regex>)>> =
    Lazy::new(|| {
        FRAMEWORK_SIGNATURES
            .iter()
            .map(|sig| {
                let version = compile(&format!(r"{}[/\s](\d+\.\d+)", regex::escape(sig.name)));
                (sig.name, compile_all(sig.patterns), version)
            })
            .collect()
    });

pub static OS_RULES: Lazy<Vec<(&'static str, Vec<Regex>, Option<Regex>)>> = Lazy::new(|| {
    OS_SIGNATURES
        .iter()
        .map(|sig| {
            (
                sig.name,
                compile_all(sig.patterns),
                sig.version_pattern.and_then(compile),
            )
        })
        .collect()
});

pub static ERROR_VERSION_RE: Lazy<Option<Regex>> = Lazy::new(|| compile(ERROR_VERSION_PATTERN));

pub static SOURCE_VISIBLE_RULES: Lazy<Vec<Regex>> =
    Lazy::new(|| compile_all(SOURCE_VISIBLE_MARKERS));

pub static FILE_CONTENT_RULES: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    vec![
        ("linux_files", compile_all(LINUX_FILE_INDICATORS)),
        ("windows_files", compile_all(WINDOWS_FILE_INDICATORS)),
    ]
});

pub static UPLOAD_PATH_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    let directory_rules = UPLOAD_DIRECTORIES
        .iter()
        .filter_map(|dir| compile(&format!(r#"({}[^'"\s<>]+)"#, regex::escape(dir))));
    let reference_rules = UPLOAD_REFERENCE_PATTERNS.iter().filter_map(|p| compile(p));
    directory_rules.chain(reference_rules).collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_static_patterns_compile() {
        for sig in ERROR_SIGNATURES {
            assert_eq!(compile_all(sig.patterns).len(), sig.patterns.len(), "{}", sig.label);
        }
        for sig in WAF_SIGNATURES {
            assert_eq!(compile_all(sig.headers).len(), sig.headers.len(), "{}", sig.vendor);
            assert_eq!(compile_all(sig.body_patterns).len(), sig.body_patterns.len());
        }
        for sig in LANGUAGE_SIGNATURES {
            assert_eq!(compile_all(sig.header_patterns).len(), sig.header_patterns.len());
            assert_eq!(compile_all(sig.body_patterns).len(), sig.body_patterns.len());
            assert_eq!(compile_all(sig.error_patterns).len(), sig.error_patterns.len());
        }
        for sig in OS_SIGNATURES {
            assert_eq!(compile_all(sig.patterns).len(), sig.patterns.len(), "{}", sig.name);
        }
        assert_eq!(UPLOAD_PATH_RULES.len(), UPLOAD_DIRECTORIES.len() + UPLOAD_REFERENCE_PATTERNS.len());
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        assert!(compile(r"([unclosed").is_none());
        assert_eq!(compile_all(&[r"ok", r"(bad"]).len(), 1);
    }

    #[test]
    fn test_waf_confidence_boosts_in_range() {
        for sig in WAF_SIGNATURES {
            assert!(sig.confidence_boost > 0.0 && sig.confidence_boost <= 1.0);
        }
    }
}
