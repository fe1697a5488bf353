use std::fmt;

use rtswitch_backend::RuntimeFamily;

/// How a raw version string was understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecKind {
    Latest,
    /// Node only.
    Lts,
    /// Digits with separators removed, e.g. `82` for `8.2`.
    Numeric(String),
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    family: RuntimeFamily,
    raw: String,
    kind: SpecKind,
}

impl VersionSpec {
    #[must_use]
    pub fn parse(family: RuntimeFamily, raw: &str) -> Self {
        let cleaned = raw.trim().to_lowercase();
        let cleaned = cleaned.strip_prefix('v').unwrap_or(&cleaned);

        let kind = match cleaned {
            "latest" => SpecKind::Latest,
            "lts" if family == RuntimeFamily::Node => SpecKind::Lts,
            _ if is_dotted_numeric(cleaned) => SpecKind::Numeric(cleaned.replace('.', "")),
            _ => SpecKind::Passthrough,
        };

        Self {
            family,
            raw: raw.to_string(),
            kind,
        }
    }

    #[must_use]
    pub fn family(&self) -> RuntimeFamily {
        self.family
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn kind(&self) -> &SpecKind {
        &self.kind
    }
}

fn is_dotted_numeric(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Ordered package identifiers to try. Never empty, no duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCandidate {
    ids: Vec<String>,
}

impl PackageCandidate {
    /// Build from `ids`, keeping first occurrences. `fallback` becomes the
    /// only candidate when `ids` is empty.
    #[must_use]
    pub fn new<I, S>(ids: I, fallback: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.is_empty() {
            unique.push(fallback.to_string());
        }
        Self { ids: unique }
    }

    #[must_use]
    pub fn single(id: &str) -> Self {
        Self::new([id], id)
    }

    #[must_use]
    pub fn primary(&self) -> &str {
        &self.ids[0]
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn iter(&self) -> <&Self as IntoIterator>::IntoIter {
        self.into_iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<'a> IntoIterator for &'a PackageCandidate {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().map(String::as_str)
    }
}

impl fmt::Display for PackageCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ids.join(", "))
    }
}

fn java_aliases(digits: &str) -> &'static [&'static str] {
    match digits {
        "8" => &["temurin8-jdk", "ojdkbuild8", "zulujdk8"],
        "11" => &["temurin11-jdk"],
        "17" => &["temurin17-jdk"],
        "21" => &["temurin21-jdk"],
        _ => &[],
    }
}

/// Map user input to the package identifiers to try, most preferred first.
#[must_use]
pub fn normalize(family: RuntimeFamily, raw: &str) -> PackageCandidate {
    let spec = VersionSpec::parse(family, raw);
    candidates_for(&spec)
}

#[must_use]
pub fn candidates_for(spec: &VersionSpec) -> PackageCandidate {
    let family = spec.family();
    let ids: Vec<String> = match spec.kind() {
        SpecKind::Latest => vec![family.flagship().to_string()],
        SpecKind::Lts => vec!["nodejs-lts".to_string()],
        SpecKind::Numeric(digits) => {
            let mut ids = vec![format!("{}{digits}", family.canonical_prefix())];
            if family == RuntimeFamily::Java {
                ids.extend(java_aliases(digits).iter().map(ToString::to_string));
            }
            ids
        }
        SpecKind::Passthrough => vec![spec.raw().to_string()],
    };
    PackageCandidate::new(ids, spec.raw())
}
