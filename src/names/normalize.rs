// src/names/normalize.rs

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::vocab::TitleVocabulary;

/// A raw administrative name broken into its comparable parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub raw: String,
    /// Title prefix removed from the name, as it was written.
    pub stripped_title: Option<String>,
    pub canonical_title: String,
    pub body: String,
    pub body_translit: String,
    pub title_translit: String,
}

impl NameRecord {
    pub fn new(
        raw: impl Into<String>,
        stripped_title: Option<String>,
        body: String,
        canonical_title: String,
    ) -> Self {
        let body_translit = transliterate(&body);
        let title_translit = transliterate(&canonical_title);
        Self {
            raw: raw.into(),
            stripped_title,
            canonical_title,
            body,
            body_translit,
            title_translit,
        }
    }
}

/// Stateless name normalization over a [`TitleVocabulary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NameNormalizer {
    vocab: TitleVocabulary,
}

impl NameNormalizer {
    pub fn new(vocab: TitleVocabulary) -> Self {
        Self { vocab }
    }

    pub fn vocab(&self) -> &TitleVocabulary {
        &self.vocab
    }

    /// Normalize a name whose title is written into the name itself
    /// ("Quận 1", "Thành phố Hồ Chí Minh").
    pub fn normalize(&self, raw: &str) -> NameRecord {
        let compact = compact(raw);
        let title = self.canonical_title(&compact);
        let (stripped_title, body) = self.split_title(&compact);
        NameRecord::new(raw, stripped_title, body, title)
    }

    /// Normalize a name that comes with its own title column.
    pub fn normalize_titled(&self, raw: &str, raw_title: &str) -> NameRecord {
        let compact = compact(raw);
        let (stripped_title, body) = self.split_title(&compact);
        NameRecord::new(raw, stripped_title, body, self.canonical_title(raw_title))
    }

    /// Canonical body of `raw`: parenthetical suffix dropped, whitespace
    /// removed, leading title stripped, numeric names without leading zeros.
    pub fn body(&self, raw: &str) -> String {
        self.split_title(&compact(raw)).1
    }

    /// Canonical long form of a title, or the (NFC, trimmed) input unchanged.
    pub fn canonical_title(&self, raw_title: &str) -> String {
        let title: String = raw_title.trim().nfc().collect();
        match self.vocab.canonical_title(&title) {
            Some(canonical) => canonical.to_string(),
            None => title,
        }
    }

    fn split_title(&self, compact: &str) -> (Option<String>, String) {
        let rest = self.vocab.strip_native(compact);
        // `compact` holds no whitespace, so the stripped prefix ends where `rest` begins
        let stripped = (rest.len() < compact.len())
            .then(|| compact[..compact.len() - rest.len()].to_string());
        (stripped, canonical_number(rest))
    }
}

/// NFC, cut at the first `(`, and drop all whitespace.
fn compact(raw: &str) -> String {
    let nfc: String = raw.nfc().collect();
    let head = match nfc.find('(') {
        Some(idx) => &nfc[..idx],
        None => nfc.as_str(),
    };
    head.chars().filter(|c| !c.is_whitespace()).collect()
}

/// "01" → "1"; anything that is not purely ASCII digits is returned as is.
fn canonical_number(body: &str) -> String {
    if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = body.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        body.to_string()
    }
}

/// Diacritic-free, lowercase, whitespace-free ASCII key for a name.
pub fn transliterate(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' | 'Đ' | 'ð' | 'Ð' => 'd',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii() && !c.is_ascii_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::vocab::strip_prefix_ci;
    use proptest::prelude::*;

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(TitleVocabulary::standard())
    }

    #[test]
    fn census_style_name_splits_title_and_body() {
        let rec = normalizer().normalize("Quận 1");
        assert_eq!(rec.canonical_title, "Quận");
        assert_eq!(rec.stripped_title.as_deref(), Some("Quận"));
        assert_eq!(rec.body, "1");
        assert_eq!(rec.body_translit, "1");
        assert_eq!(rec.title_translit, "quan");
    }

    #[test]
    fn city_title_is_stripped() {
        let rec = normalizer().normalize("Thành phố Hồ Chí Minh");
        assert_eq!(rec.canonical_title, "ThànhPhố");
        assert_eq!(rec.body, "HồChíMinh");
        assert_eq!(rec.body_translit, "hochiminh");
        assert_eq!(rec.title_translit, "thanhpho");
    }

    #[test]
    fn parenthetical_suffix_is_dropped() {
        let rec = normalizer().normalize_titled("CaoLãnh(Thànhphố)", "Thànhphố");
        assert_eq!(rec.body, "CaoLãnh");
        assert_eq!(rec.canonical_title, "ThànhPhố");
        assert_eq!(rec.stripped_title, None);
    }

    #[test]
    fn numeric_body_loses_leading_zeros() {
        assert_eq!(normalizer().body("Phường 01"), "1");
        assert_eq!(normalizer().body("Phường 00"), "0");
        assert_eq!(normalizer().body("Phường 10"), "10");
    }

    #[test]
    fn unrecognized_title_passes_through() {
        let rec = normalizer().normalize_titled("BếnNghé", "Khu phố");
        assert_eq!(rec.body, "BếnNghé");
        assert_eq!(rec.canonical_title, "Khu phố");
    }

    #[test]
    fn empty_name_passes_through() {
        let rec = normalizer().normalize("");
        assert_eq!(rec.body, "");
        assert_eq!(rec.body_translit, "");
        assert_eq!(rec.canonical_title, "");
        assert_eq!(rec.stripped_title, None);
    }

    #[test]
    fn transliteration_drops_marks_spaces_and_case() {
        assert_eq!(transliterate("Quận Một"), "quanmot");
        assert_eq!(transliterate("Đắk Lắk"), "daklak");
        assert_eq!(transliterate("Thừa Thiên Huế"), "thuathienhue");
        assert_eq!(transliterate("Hòa Tú 2"), "hoatu2");
    }

    #[test]
    fn decomposed_input_matches_precomposed() {
        let decomposed: String = "Quận".nfd().collect();
        assert_eq!(normalizer().normalize(&decomposed).canonical_title, "Quận");
        assert_eq!(transliterate(&decomposed), "quan");
    }

    const SYLLABLES: &[&str] = &[
        "Bình", "Tân", "Hòa", "Long", "An", "Mỹ", "Phú", "Sơn", "Lộc", "Đông", "Tây", "Nam",
        "Bắc", "Hưng", "Thạnh", "Lợi", "Vĩnh", "Cát", "Lái", "12", "07",
    ];

    const TITLES: &[&str] = &[
        "Quận", "Phường", "Xã", "Huyện", "Thị xã", "Thị trấn", "Thành phố", "Tỉnh", "q.", "p.",
        "tp.", "tt.",
    ];

    fn place_name() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(SYLLABLES), 1..4).prop_map(|s| s.join(" "))
    }

    proptest! {
        #[test]
        fn normalizing_a_canonical_body_is_idempotent(
            title in prop::sample::select(TITLES),
            body in place_name(),
        ) {
            let n = normalizer();
            let once = n.normalize(&format!("{} {}", title, body));
            let twice = n.normalize(&once.body);
            prop_assert_eq!(&twice.body, &once.body);
        }

        #[test]
        fn stripped_name_never_starts_with_a_title(
            title in prop::sample::select(TITLES),
            body in place_name(),
        ) {
            let n = normalizer();
            let rec = n.normalize(&format!("{}{}", title, body));
            prop_assert!(rec.stripped_title.is_some());
            for variant in n.vocab().variants() {
                prop_assert!(strip_prefix_ci(&rec.body, variant).is_none());
            }
        }

        #[test]
        fn transliteration_is_ascii_and_stable(name in "\\PC{0,24}") {
            let key = transliterate(&name);
            prop_assert!(key.chars().all(|c| c.is_ascii() && !c.is_ascii_whitespace()));
            prop_assert_eq!(transliterate(&key), key);
        }
    }
}
