//! Upload safety checks and file name handling.
//!
//! Two layers run before anything is stored:
//! 1. Size limit and executable rejection (extension blocklist + magic bytes)
//! 2. Name sanitisation for the storage path

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Magic byte signatures for executable files
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat / Java Class", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// Blocked file extensions (case-insensitive)
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "scr", "pif", "com", "msi", "so", "dylib", "jar", "class", "apk", "dmg",
        "pkg", "docm", "dotm", "bat", "cmd", "ps1", "sh", "lnk", "hta",
    ]
    .into_iter()
    .collect()
});

/// Outcome of validating an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadCheck {
    Allowed,
    TooLarge { limit: usize },
    Blocked { reason: String },
}

impl UploadCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, UploadCheck::Allowed)
    }
}

/// Validate an upload's size and reject executable payloads.
pub fn validate_upload(filename: &str, data: &[u8], max_size_bytes: usize) -> UploadCheck {
    if data.len() > max_size_bytes {
        return UploadCheck::TooLarge {
            limit: max_size_bytes,
        };
    }

    if let Some((_, ext)) = filename.rsplit_once('.') {
        if BLOCKED_EXTENSIONS.contains(ext.to_lowercase().as_str()) {
            return UploadCheck::Blocked {
                reason: format!("File extension .{} is not allowed", ext),
            };
        }
    }

    for (name, magic) in MAGIC_SIGNATURES {
        if data.len() >= magic.len() && &data[..magic.len()] == *magic {
            return UploadCheck::Blocked {
                reason: format!("Executable file detected: {}", name),
            };
        }
    }

    UploadCheck::Allowed
}

/// Detect the stored content type from magic bytes, falling back to the claimed type.
///
/// DOCX files sniff as `application/zip`; the extension refines that.
pub fn detect_content_type(filename: &str, data: &[u8], claimed: &str) -> String {
    let lower = filename.to_lowercase();
    match infer::get(data) {
        Some(kind) if kind.mime_type() == "application/zip" && lower.ends_with(".docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string()
        }
        Some(kind) => kind.mime_type().to_string(),
        None if claimed.trim().is_empty() => "application/octet-stream".to_string(),
        None => claimed.to_string(),
    }
}

/// Strip directory components from a client-supplied file name for display.
pub fn display_file_name(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename).trim();
    if name.is_empty() {
        "unnamed_file".to_string()
    } else {
        name.to_string()
    }
}

/// Make a file name safe for use as the last storage path segment.
///
/// Every character outside `[A-Za-z0-9.-]` becomes `_`.
pub fn sanitize_storage_name(filename: &str) -> String {
    let sanitized: String = display_file_name(filename)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // A name made only of dots would resolve to a directory
    if sanitized.chars().all(|c| c == '.') {
        return "unnamed_file".to_string();
    }
    sanitized
}

/// Storage path for a new upload: `{user_id}/{client_id}/{unix_millis}_{sanitized_name}`.
pub fn storage_path(
    user_id: uuid::Uuid,
    client_id: uuid::Uuid,
    uploaded_at_millis: i64,
    filename: &str,
) -> String {
    format!(
        "{}/{}/{}_{}",
        user_id,
        client_id,
        uploaded_at_millis,
        sanitize_storage_name(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_sanitize_replaces_disallowed_chars() {
        assert_eq!(
            sanitize_storage_name("Client Intake (final).pdf"),
            "Client_Intake__final_.pdf"
        );
        assert_eq!(sanitize_storage_name("über-form.docx"), "_ber-form.docx");
    }

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(sanitize_storage_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_storage_name("C:\\forms\\a b.pdf"), "a_b.pdf");
    }

    #[test]
    fn test_sanitize_dot_only_names() {
        assert_eq!(sanitize_storage_name(".."), "unnamed_file");
        assert_eq!(sanitize_storage_name(""), "unnamed_file");
    }

    #[test]
    fn test_storage_path_layout() {
        let user = Uuid::nil();
        let client = Uuid::from_u128(1);
        let path = storage_path(user, client, 1_700_000_000_000, "my form.pdf");
        assert_eq!(
            path,
            format!("{}/{}/1700000000000_my_form.pdf", user, client)
        );
    }

    #[test]
    fn test_validate_blocks_executables() {
        let elf = [0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01];
        assert!(matches!(
            validate_upload("form.pdf", &elf, 1024),
            UploadCheck::Blocked { .. }
        ));
        assert!(matches!(
            validate_upload("setup.exe", b"hello", 1024),
            UploadCheck::Blocked { .. }
        ));
    }

    #[test]
    fn test_validate_size_limit() {
        let data = vec![b'a'; 11];
        assert_eq!(
            validate_upload("a.pdf", &data, 10),
            UploadCheck::TooLarge { limit: 10 }
        );
        assert!(validate_upload("a.pdf", &data[..10], 10).is_allowed());
    }

    #[test]
    fn test_detect_pdf_by_magic() {
        let data = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n";
        assert_eq!(
            detect_content_type("form.pdf", data, "application/octet-stream"),
            "application/pdf"
        );
    }

    #[test]
    fn test_detect_falls_back_to_claimed() {
        assert_eq!(
            detect_content_type("notes.bin", b"plain bytes", "text/plain"),
            "text/plain"
        );
        assert_eq!(
            detect_content_type("notes.bin", b"plain bytes", ""),
            "application/octet-stream"
        );
    }
}
