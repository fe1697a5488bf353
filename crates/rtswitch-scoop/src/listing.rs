use chrono::NaiveDateTime;
use log::trace;
use std::collections::{BTreeMap, BTreeSet};

use rtswitch_backend::{InstallLayout, ListedPackage};

fn is_identifier(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

fn is_rule(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '-' || c.is_whitespace())
}

fn is_diagnostic(line: &str) -> bool {
    ["WARN", "ERROR", "INFO"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

fn looks_like_version(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

fn is_table_header(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    tokens.next() == Some("Name") && tokens.any(|t| t == "Version" || t == "Source")
}

/// Parse `scoop list` output.
///
/// Understands the tabular layout of current releases and the older
/// `name version [bucket]` layout. Lines that fit neither are skipped.
#[must_use]
pub fn parse_installed_packages(
    output: &str,
    layout: &InstallLayout,
) -> BTreeMap<String, ListedPackage> {
    let mut packages = BTreeMap::new();

    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty()
            || is_rule(line)
            || is_table_header(line)
            || is_diagnostic(line)
            || line.ends_with(':')
        {
            continue;
        }

        let parsed = if line.contains('[') {
            parse_legacy_row(line, layout)
        } else {
            parse_table_row(line, layout)
        };

        match parsed {
            Some(package) => {
                packages.insert(package.name.clone(), package);
            }
            None => trace!("Skipping unrecognised scoop list line: {line}"),
        }
    }

    packages
}

fn parse_table_row(line: &str, layout: &InstallLayout) -> Option<ListedPackage> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (&name, rest) = tokens.split_first()?;
    if !is_identifier(name) || !rest.first().is_some_and(|v| looks_like_version(v)) {
        return None;
    }

    let version = rest.first().map(ToString::to_string);
    let source = rest.get(1).map(ToString::to_string);

    let updated = match (rest.get(2), rest.get(3)) {
        (Some(date), Some(time)) => {
            NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").ok()
        }
        _ => None,
    };

    let info_start = if updated.is_some() { 4 } else { 2 };
    let info = rest.get(info_start..).unwrap_or_default().join(" ");

    Some(ListedPackage {
        name: name.to_string(),
        version,
        source,
        updated,
        install_path: layout.current_dir(name),
        failed: info.to_ascii_lowercase().contains("install failed"),
    })
}

fn parse_legacy_row(line: &str, layout: &InstallLayout) -> Option<ListedPackage> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    if !is_identifier(name) {
        return None;
    }

    let version = tokens
        .next()
        .filter(|token| !token.starts_with('['))
        .map(ToString::to_string);

    let source = line
        .split_once('[')
        .and_then(|(_, rest)| rest.split_once(']'))
        .map(|(bucket, _)| bucket.trim().to_string())
        .filter(|bucket| !bucket.is_empty());

    Some(ListedPackage {
        name: name.to_string(),
        version,
        source,
        updated: None,
        install_path: layout.current_dir(name),
        failed: line.contains("*failed*"),
    })
}

/// Bucket names from `scoop bucket list`, tabular or one per line.
#[must_use]
pub fn parse_bucket_list(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !is_rule(line) && !is_table_header(line) && !is_diagnostic(line)
        })
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| is_identifier(name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn layout() -> InstallLayout {
        InstallLayout::new("/scoop")
    }

    #[test]
    fn parses_table_output() {
        let output = "Installed apps:\n\n\
            Name     Version  Source   Updated             Info\n\
            ----     -------  ------   -------             ----\n\
            7zip     23.01    main     2023-07-01 10:00:00\n\
            nodejs18 18.19.0  versions 2024-01-02 12:30:00 Install failed\n\
            php82    8.2.15   versions 2024-01-03 08:00:00 Global install\n";

        let packages = parse_installed_packages(output, &layout());

        assert_eq!(packages.len(), 3);
        let node = &packages["nodejs18"];
        assert_eq!(node.version.as_deref(), Some("18.19.0"));
        assert_eq!(node.source.as_deref(), Some("versions"));
        assert!(node.failed);
        assert!(node.updated.is_some());
        assert_eq!(
            node.install_path,
            PathBuf::from("/scoop/apps/nodejs18/current")
        );
        assert!(!packages["php82"].failed);
        assert!(!packages["7zip"].failed);
    }

    #[test]
    fn parses_legacy_output() {
        let output = "Installed apps:\n\n  \
            openjdk17 17.0.2-8 [java]\n  \
            python311 3.11.7 [versions] *failed*\n";

        let packages = parse_installed_packages(output, &layout());

        assert_eq!(packages.len(), 2);
        assert_eq!(packages["openjdk17"].source.as_deref(), Some("java"));
        assert_eq!(packages["openjdk17"].version.as_deref(), Some("17.0.2-8"));
        assert!(packages["python311"].failed);
        assert!(packages["python311"].updated.is_none());
    }

    #[test]
    fn ignores_noise_lines() {
        let output = "WARN  Scoop is out of date. Run 'scoop update' to get the latest changes.\n\
            There aren't any apps installed.\n";

        let packages = parse_installed_packages(output, &layout());

        assert!(packages.is_empty());
    }

    #[test]
    fn table_row_without_timestamp_keeps_name_version_source() {
        let packages = parse_installed_packages("nodejs-lts 20.11.0 main\n", &layout());

        let node = &packages["nodejs-lts"];
        assert_eq!(node.version.as_deref(), Some("20.11.0"));
        assert_eq!(node.source.as_deref(), Some("main"));
        assert!(node.updated.is_none());
    }

    #[test]
    fn parses_bucket_table() {
        let output = "Name     Source                                   Updated             Manifests\n\
            ----     ------                                   -------             ---------\n\
            main     https://github.com/ScoopInstaller/Main   2024-01-01 10:00:00      1350\n\
            versions https://github.com/ScoopInstaller/Versions 2024-01-01 10:00:00    500\n";

        let buckets = parse_bucket_list(output);

        assert_eq!(
            buckets.into_iter().collect::<Vec<_>>(),
            vec!["main".to_string(), "versions".to_string()]
        );
    }

    #[test]
    fn parses_plain_bucket_names() {
        let buckets = parse_bucket_list("main\njava\n\n");
        assert!(buckets.contains("main"));
        assert!(buckets.contains("java"));
    }
}
