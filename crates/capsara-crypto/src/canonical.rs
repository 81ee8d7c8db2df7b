//! The canonical string signed by the creator and re-derived for verification.
//!
//! Field order and separators are fixed; any divergence between a builder
//! and a verifier breaks every signature.

/// Separator between top-level canonical string fields.
pub const CANONICAL_FIELD_SEP: char = '|';

/// Separator between per-file tuples within the files field.
pub const CANONICAL_FILE_SEP: char = ';';

/// Separator between the fields of one file tuple.
pub const CANONICAL_TUPLE_SEP: char = ',';

/// One file's contribution to the canonical string.
pub struct CapsaFileTuple<'a> {
    pub file_id: &'a str,
    pub hash_hex: &'a str,
    pub ciphertext_size: u64,
    pub content_iv: &'a str,
    pub filename_iv: &'a str,
}

impl CapsaFileTuple<'_> {
    fn render(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.file_id,
            self.hash_hex,
            self.ciphertext_size,
            self.content_iv,
            self.filename_iv,
            sep = CANONICAL_TUPLE_SEP
        )
    }
}

/// Build the canonical string for a capsa about to be signed or verified.
pub fn build_canonical_string(
    package_id: &str,
    total_ciphertext_size: u64,
    files: &[CapsaFileTuple<'_>],
    structured_iv: Option<&str>,
    subject_iv: Option<&str>,
    body_iv: Option<&str>,
) -> String {
    let files_field = files
        .iter()
        .map(CapsaFileTuple::render)
        .collect::<Vec<_>>()
        .join(&CANONICAL_FILE_SEP.to_string());

    let mut fields = vec![
        package_id.to_string(),
        total_ciphertext_size.to_string(),
        "AES-256-GCM".to_string(),
        files_field,
    ];
    for iv in [structured_iv, subject_iv, body_iv] {
        if let Some(iv) = iv {
            fields.push(iv.to_string());
        }
    }

    fields.join(&CANONICAL_FIELD_SEP.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_optional_fields() {
        let s = build_canonical_string("capsa_abc", 42, &[], None, None, None);
        assert_eq!(s, "capsa_abc|42|AES-256-GCM|");
    }

    #[test]
    fn with_one_file() {
        let files = vec![CapsaFileTuple {
            file_id: "file_xyz.enc",
            hash_hex: "deadbeef",
            ciphertext_size: 10,
            content_iv: "content-iv",
            filename_iv: "filename-iv",
        }];
        let s = build_canonical_string("capsa_abc", 10, &files, None, None, None);
        assert_eq!(
            s,
            "capsa_abc|10|AES-256-GCM|file_xyz.enc,deadbeef,10,content-iv,filename-iv"
        );
    }

    #[test]
    fn with_two_files_and_all_optional_ivs() {
        let files = vec![
            CapsaFileTuple {
                file_id: "file_a.enc",
                hash_hex: "aaaa",
                ciphertext_size: 1,
                content_iv: "civ-a",
                filename_iv: "fiv-a",
            },
            CapsaFileTuple {
                file_id: "file_b.enc",
                hash_hex: "bbbb",
                ciphertext_size: 2,
                content_iv: "civ-b",
                filename_iv: "fiv-b",
            },
        ];
        let s = build_canonical_string(
            "capsa_abc",
            3,
            &files,
            Some("struct-iv"),
            Some("subj-iv"),
            Some("body-iv"),
        );
        assert_eq!(
            s,
            "capsa_abc|3|AES-256-GCM|file_a.enc,aaaa,1,civ-a,fiv-a;file_b.enc,bbbb,2,civ-b,fiv-b|struct-iv|subj-iv|body-iv"
        );
    }

    #[test]
    fn separators_never_collide_with_base64url_or_decimal() {
        let forbidden = [CANONICAL_FIELD_SEP, CANONICAL_FILE_SEP, CANONICAL_TUPLE_SEP];
        let base64url_alphabet: Vec<char> = ('A'..='Z')
            .chain('a'..='z')
            .chain('0'..='9')
            .chain(['_', '-'])
            .collect();
        for c in forbidden {
            assert!(!base64url_alphabet.contains(&c));
            assert!(!c.is_ascii_digit());
        }
    }

    #[test]
    fn deterministic_for_identical_input() {
        let files = vec![CapsaFileTuple {
            file_id: "file_a.enc",
            hash_hex: "aaaa",
            ciphertext_size: 1,
            content_iv: "civ-a",
            filename_iv: "fiv-a",
        }];
        let a = build_canonical_string("capsa_x", 1, &files, None, Some("s"), None);
        let b = build_canonical_string("capsa_x", 1, &files, None, Some("s"), None);
        assert_eq!(a, b);
    }
}
