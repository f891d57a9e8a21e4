//! Object key conventions shared by uploads, generation and cleanup.

use uuid::Uuid;

const TEMPLATE_FOLDER: &str = "certificados";
pub const LOGO_FOLDER: &str = "logos";
pub const SIGNATURE_FOLDER: &str = "assinaturas";

/// Removes characters that are not allowed in file names on common platforms.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

/// Location of a certificate's blank template and its positioning sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateKeys {
    pub pdf: String,
    pub config: String,
}

impl TemplateKeys {
    pub fn for_course(course_name: &str) -> Self {
        let base = sanitize_file_name(course_name);
        Self {
            pdf: format!("{}/{}/{}.pdf", TEMPLATE_FOLDER, base, base),
            config: format!("{}/{}/{}.config", TEMPLATE_FOLDER, base, base),
        }
    }
}

/// A fresh key for an auxiliary image, keeping the uploaded file's extension.
pub fn asset_key(folder: &str, file_name: &str) -> String {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    format!("{}/{}{}", folder, Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_invalid_characters() {
        assert_eq!(sanitize_file_name("Rust: Avançado / Módulo 2?"), "Rust Avançado  Módulo 2");
        assert_eq!(sanitize_file_name("a\tb\u{0}c"), "abc");
        assert_eq!(sanitize_file_name("Plain name"), "Plain name");
    }

    #[test]
    fn test_template_keys_follow_course_name() {
        let keys = TemplateKeys::for_course("Segurança do Trabalho");
        assert_eq!(keys.pdf, "certificados/Segurança do Trabalho/Segurança do Trabalho.pdf");
        assert_eq!(keys.config, "certificados/Segurança do Trabalho/Segurança do Trabalho.config");

        let keys = TemplateKeys::for_course("C/C++");
        assert_eq!(keys.pdf, "certificados/CC++/CC++.pdf");
    }

    #[test]
    fn test_asset_key_keeps_extension() {
        let key = asset_key(LOGO_FOLDER, "Logo.PNG");
        assert!(key.starts_with("logos/"));
        assert!(key.ends_with(".png"));
        assert_eq!(key.len(), "logos/".len() + 36 + ".png".len());

        let key = asset_key(SIGNATURE_FOLDER, "signature");
        assert_eq!(key.len(), "assinaturas/".len() + 36);
    }
}
