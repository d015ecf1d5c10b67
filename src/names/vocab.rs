// src/names/vocab.rs

/// Administrative-title variants and their canonical long form.
///
/// Order matters: lookups take the first entry whose key is a
/// case-insensitive prefix of the input, so abbreviations with a dot come
/// before the full words that share their first letter.
static TITLE_VARIANTS: &[(&str, &str)] = &[
    ("tp.", "ThànhPhố"),
    ("t.", "Tỉnh"),
    ("q.", "Quận"),
    ("tx.", "ThịXã"),
    ("h.", "Huyện"),
    ("p.", "Phường"),
    ("tt.", "ThịTrấn"),
    ("x.", "Xã"),
    ("thành phố", "ThànhPhố"),
    ("thànhphố", "ThànhPhố"),
    ("tỉnh", "Tỉnh"),
    ("quận", "Quận"),
    ("thị xã", "ThịXã"),
    ("thịxã", "ThịXã"),
    ("huyện", "Huyện"),
    ("phường", "Phường"),
    ("thị trấn", "ThịTrấn"),
    ("thịtrấn", "ThịTrấn"),
    ("xã", "Xã"),
    ("trungtâmhuấnluyện", "TTHL"),
    ("đảo", "Huyện"),
];

/// Title prefixes as they appear in already-transliterated names.
static TRANSLIT_PREFIXES: &[&str] = &[
    "thanhpho",
    "tinh",
    "quan",
    "thixa",
    "huyen",
    "phuong",
    "thitran",
    "xa",
    "trungtamhuanluyen",
    "dao",
];

/// Bilingual title vocabulary shared by every normalization step.
#[derive(Debug, Clone, Copy)]
pub struct TitleVocabulary {
    variants: &'static [(&'static str, &'static str)],
    translit_prefixes: &'static [&'static str],
}

impl Default for TitleVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl TitleVocabulary {
    pub const fn standard() -> Self {
        Self {
            variants: TITLE_VARIANTS,
            translit_prefixes: TRANSLIT_PREFIXES,
        }
    }

    pub fn variants(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.variants.iter().map(|(key, _)| *key)
    }

    /// Canonical long form for `raw_title`, if any variant prefixes it.
    pub fn canonical_title(&self, raw_title: &str) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|(key, _)| strip_prefix_ci(raw_title, key).is_some())
            .map(|(_, canonical)| *canonical)
    }

    /// Remove the first native title variant that prefixes `name`.
    pub fn strip_native<'a>(&self, name: &'a str) -> &'a str {
        self.variants
            .iter()
            .find_map(|(key, _)| strip_prefix_ci(name, key))
            .map(str::trim)
            .unwrap_or(name)
    }

    /// Remove the first transliterated title prefix from an ASCII key.
    pub fn strip_translit<'a>(&self, name: &'a str) -> &'a str {
        self.translit_prefixes
            .iter()
            .find_map(|prefix| strip_prefix_ci(name, prefix))
            .map(str::trim)
            .unwrap_or(name)
    }
}

/// Case-insensitive `strip_prefix`, comparing lowercased chars so multi-byte
/// letters ("Quận" vs "quận") line up regardless of their byte widths.
pub(crate) fn strip_prefix_ci<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let mut wanted = prefix.chars().flat_map(char::to_lowercase).peekable();
    let mut end = 0;
    for (idx, c) in name.char_indices() {
        if wanted.peek().is_none() {
            break;
        }
        for lc in c.to_lowercase() {
            if wanted.next() != Some(lc) {
                return None;
            }
        }
        end = idx + c.len_utf8();
    }
    if wanted.peek().is_some() {
        return None;
    }
    Some(&name[end..])
}
