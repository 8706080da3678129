//! Installed-package listing.
//!
//! Parses `rpm -q -a` output: one `name-version-release.arch` per line.

/// Returns the packages whose name contains `filter`, in listing order.
/// An empty filter keeps every package.
#[must_use]
pub fn parse_package_listing(raw: &str, filter: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains(filter))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RPMS: &str = "\
bash-4.4.19-14.el8.x86_64
servicemesh-proxy-2.0.0-6.el8.x86_64

servicemesh-pilot-discovery-2.0.0-7.el8.x86_64
openssl-libs-1.1.1g-12.el8_3.x86_64
";

    #[test]
    fn test_filters_servicemesh_packages() {
        assert_eq!(
            parse_package_listing(RPMS, "servicemesh"),
            vec![
                "servicemesh-proxy-2.0.0-6.el8.x86_64",
                "servicemesh-pilot-discovery-2.0.0-7.el8.x86_64"
            ]
        );
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        assert_eq!(parse_package_listing(RPMS, "").len(), 4);
        assert!(parse_package_listing("", "servicemesh").is_empty());
    }
}
