// src/names/mod.rs

pub mod normalize;
pub mod vocab;

pub use normalize::{transliterate, NameNormalizer, NameRecord};
pub use vocab::TitleVocabulary;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tier of the province/city → district → ward hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminLevel {
    City,
    District,
    Ward,
}

impl AdminLevel {
    pub fn depth(self) -> u8 {
        match self {
            AdminLevel::City => 1,
            AdminLevel::District => 2,
            AdminLevel::Ward => 3,
        }
    }

    /// Short column prefix used in exported tables (`dist_id`, `ward_title`, ...).
    pub fn column_prefix(self) -> &'static str {
        match self {
            AdminLevel::City => "city",
            AdminLevel::District => "dist",
            AdminLevel::Ward => "ward",
        }
    }

    /// Capitalized label used in output file names.
    pub fn label(self) -> &'static str {
        match self {
            AdminLevel::City => "City",
            AdminLevel::District => "District",
            AdminLevel::Ward => "Ward",
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdminLevel::City => "city",
            AdminLevel::District => "district",
            AdminLevel::Ward => "ward",
        })
    }
}

/// Which half of a [`NameKey`] a comparison uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Native,
    Translit,
}

/// A name in both spellings: canonical native script and its ASCII key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameKey {
    pub native: String,
    pub translit: String,
}

impl NameKey {
    pub fn new(native: impl Into<String>) -> Self {
        let native = native.into();
        let translit = transliterate(&native);
        Self { native, translit }
    }

    pub fn get(&self, script: Script) -> &str {
        match script {
            Script::Native => &self.native,
            Script::Translit => &self.translit,
        }
    }
}

/// Identity of one administrative unit: its name and its title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminName {
    pub name: NameKey,
    pub title: NameKey,
}

impl From<NameRecord> for AdminName {
    fn from(rec: NameRecord) -> Self {
        AdminName {
            name: NameKey {
                native: rec.body,
                translit: rec.body_translit,
            },
            title: NameKey {
                native: rec.canonical_title,
                translit: rec.title_translit,
            },
        }
    }
}

impl fmt::Display for AdminName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.native.is_empty() {
            f.write_str(&self.name.native)
        } else {
            write!(f, "{} {}", self.title.native, self.name.native)
        }
    }
}

/// A unit located in the hierarchy. `ward` is `None` for district-level units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AdminPath {
    pub city: AdminName,
    pub district: AdminName,
    pub ward: Option<AdminName>,
}

impl AdminPath {
    pub fn level(&self) -> AdminLevel {
        if self.ward.is_some() {
            AdminLevel::Ward
        } else {
            AdminLevel::District
        }
    }

    /// The unit this path points at (ward if present, district otherwise).
    pub fn unit(&self) -> &AdminName {
        self.ward.as_ref().unwrap_or(&self.district)
    }

    /// Join key over the city, district and ward names in one script. With
    /// `titled`, the district title and the unit's own title are appended
    /// (the city title never takes part).
    pub fn key(&self, script: Script, titled: bool) -> String {
        let mut parts = vec![self.city.name.get(script), self.district.name.get(script)];
        if let Some(ward) = &self.ward {
            parts.push(ward.name.get(script));
        }
        if titled {
            parts.push(self.district.title.get(script));
            parts.push(self.unit().title.get(script));
        }
        parts.join(KEY_SEPARATOR)
    }
}

const KEY_SEPARATOR: &str = "\u{1f}";

impl fmt::Display for AdminPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.city, self.district)?;
        if let Some(ward) = &self.ward {
            write!(f, " / {}", ward)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(native: &str, title: &str) -> AdminName {
        AdminName {
            name: NameKey::new(native),
            title: NameKey::new(title),
        }
    }

    #[test]
    fn path_keys_follow_level_and_script() {
        let district = AdminPath {
            city: name("HồChíMinh", ""),
            district: name("1", "Quận"),
            ward: None,
        };
        assert_eq!(district.level(), AdminLevel::District);
        assert_eq!(
            district.key(Script::Translit, true),
            ["hochiminh", "1", "quan", "quan"].join(KEY_SEPARATOR)
        );

        let ward = AdminPath {
            ward: Some(name("BếnNghé", "Phường")),
            ..district.clone()
        };
        assert_eq!(ward.unit().name.native, "BếnNghé");
        assert_eq!(
            ward.key(Script::Native, false),
            ["HồChíMinh", "1", "BếnNghé"].join(KEY_SEPARATOR)
        );
        assert_eq!(ward.to_string(), "HồChíMinh / Quận 1 / Phường BếnNghé");
    }
}
