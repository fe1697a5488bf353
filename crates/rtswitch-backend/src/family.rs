use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const PHP_PACKAGES: &[&str] = &[
    "php", "php84", "php83", "php82", "php81", "php80", "php74", "php73", "php72", "php71",
    "php70", "php56",
];

const PYTHON_PACKAGES: &[&str] = &[
    "python",
    "python313",
    "python312",
    "python311",
    "python310",
    "python39",
    "python38",
    "python37",
    "python27",
];

const JAVA_PACKAGES: &[&str] = &[
    "openjdk",
    "openjdk23",
    "openjdk22",
    "openjdk21",
    "openjdk17",
    "openjdk11",
    "openjdk8",
    "temurin8-jdk",
    "ojdkbuild8",
    "zulujdk8",
    "temurin21-jdk",
    "temurin17-jdk",
    "temurin11-jdk",
];

const NODE_PACKAGES: &[&str] = &[
    "nodejs", "nodejs-lts", "nodejs22", "nodejs20", "nodejs18", "nodejs16", "nodejs14",
];

/// Vendor prefixes that also name Java builds, checked by [`RuntimeFamily::owns`].
const JAVA_VENDOR_PREFIXES: &[&str] = &["openjdk", "temurin", "ojdkbuild", "zulujdk", "zulu"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeFamily {
    Php,
    Python,
    Java,
    Node,
}

impl RuntimeFamily {
    pub const ALL: [Self; 4] = [Self::Php, Self::Python, Self::Java, Self::Node];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Php => "php",
            Self::Python => "python",
            Self::Java => "java",
            Self::Node => "node",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Php => "PHP",
            Self::Python => "Python",
            Self::Java => "Java",
            Self::Node => "Node.js",
        }
    }

    /// Prefix joined with a digits-only version to form a package identifier.
    #[must_use]
    pub const fn canonical_prefix(self) -> &'static str {
        match self {
            Self::Php => "php",
            Self::Python => "python",
            Self::Java => "openjdk",
            Self::Node => "nodejs",
        }
    }

    /// Unsuffixed identifier tracking the newest release.
    #[must_use]
    pub const fn flagship(self) -> &'static str {
        self.canonical_prefix()
    }

    /// Known canonical identifiers, newest first.
    #[must_use]
    pub const fn known_packages(self) -> &'static [&'static str] {
        match self {
            Self::Php => PHP_PACKAGES,
            Self::Python => PYTHON_PACKAGES,
            Self::Java => JAVA_PACKAGES,
            Self::Node => NODE_PACKAGES,
        }
    }

    /// Bucket that hosts the versioned packages of this family.
    #[must_use]
    pub const fn bucket(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Php | Self::Python | Self::Node => "versions",
        }
    }

    #[must_use]
    pub const fn executable_stem(self) -> &'static str {
        match self {
            Self::Php => "php",
            Self::Python => "python",
            Self::Java => "java",
            Self::Node => "node",
        }
    }

    /// Primary executable file name on the current platform.
    #[must_use]
    pub fn executable(self) -> String {
        format!("{}{}", self.executable_stem(), std::env::consts::EXE_SUFFIX)
    }

    /// Locations of the primary executable relative to an install root, in
    /// lookup order.
    #[must_use]
    pub fn executable_subpaths(self) -> [PathBuf; 2] {
        let exe = self.executable();
        [PathBuf::from("bin").join(&exe), PathBuf::from(exe)]
    }

    /// Dedicated home-directory variable, if the family has one.
    #[must_use]
    pub const fn home_variable(self) -> Option<&'static str> {
        match self {
            Self::Java => Some("JAVA_HOME"),
            Self::Php | Self::Python | Self::Node => None,
        }
    }

    /// Whether a package identifier names a build of this family.
    #[must_use]
    pub fn owns(self, id: &str) -> bool {
        let id = id.to_ascii_lowercase();
        if self.known_packages().contains(&id.as_str()) {
            return true;
        }

        match self {
            Self::Java => JAVA_VENDOR_PREFIXES
                .iter()
                .any(|prefix| suffix_is_version(&id, prefix)),
            Self::Node => suffix_is_version(&id, "nodejs"),
            Self::Php | Self::Python => suffix_is_version(&id, self.canonical_prefix()),
        }
    }
}

fn suffix_is_version(id: &str, prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix) else {
        return false;
    };
    let digits = rest.split('-').next().unwrap_or_default();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

impl fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown runtime family: {input}")]
pub struct UnknownFamily {
    pub input: String,
}

impl FromStr for RuntimeFamily {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "php" => Ok(Self::Php),
            "python" | "py" => Ok(Self::Python),
            "java" | "jdk" | "openjdk" => Ok(Self::Java),
            "node" | "nodejs" | "node.js" => Ok(Self::Node),
            _ => Err(UnknownFamily {
                input: s.to_string(),
            }),
        }
    }
}
