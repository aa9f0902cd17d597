//! Version extraction and the minimum-version gate.
//!
//! Comparison rules:
//! - Numeric components compared numerically: `1.10.0 > 1.9.0`
//! - Missing trailing components count as zero: `2.3 == 2.3.0`
//! - Anything after the numeric run is ignored: `1.8.0_151` is `1.8.0`
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A dotted run of at least two numeric components.
static DOTTED: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\d+(?:\.\d+)+").expect("dotted version pattern is valid")
});

/// A bare number, used when no dotted version is present.
static BARE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\d+").expect("bare version pattern is valid")
});

/// A parsed numeric version.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    components: Vec<u64>,
    original: String,
}

impl Version {
    /// Parse the leading numeric components of `s`.
    ///
    /// Returns `None` if `s` does not start with a digit.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches(['v', 'V']);
        let components: Vec<u64> = s
            .split('.')
            .map_while(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
            .collect();
        if components.is_empty() {
            return None;
        }
        Some(Self {
            components,
            original: s.to_string(),
        })
    }

    /// Find the first version number in command output.
    ///
    /// Lines matching `skip` are ignored.  A dotted version anywhere in the
    /// remaining text is preferred over a bare number.
    #[must_use]
    pub fn find_in(output: &str, skip: Option<&Regex>) -> Option<Self> {
        let lines: Vec<&str> = output
            .lines()
            .filter(|line| skip.is_none_or(|re| !re.is_match(line)))
            .collect();
        let text = lines.join("\n");
        DOTTED
            .find(&text)
            .or_else(|| BARE.find(&text))
            .and_then(|m| Self::parse(m.as_str()))
    }

    /// Whether this version satisfies `minimum`.
    #[must_use]
    pub fn at_least(&self, minimum: &Self) -> bool {
        self >= minimum
    }

    fn component(&self, i: usize) -> u64 {
        self.components.get(i).copied().unwrap_or(0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn numeric_comparison() {
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("2.12.2") > v("2.12"));
        assert!(v("0.1.6") < v("0.2"));
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(v("2.3"), v("2.3.0"));
        assert!(v("5.2").at_least(&v("5.2.0")));
    }

    #[test]
    fn suffixes_are_ignored() {
        assert_eq!(v("1.8.0_151"), v("1.8.0"));
        assert_eq!(v("v2.4"), v("2.4"));
        assert!(Version::parse("HEAD").is_none());
    }

    #[test]
    fn finds_version_in_output() {
        let found = Version::find_in("tmux 2.6\n", None).unwrap();
        assert_eq!(found.to_string(), "2.6");
        let found = Version::find_in("GNU Emacs 26.1\nCopyright (C) 2018\n", None).unwrap();
        assert_eq!(found, v("26.1"));
        let found = Version::find_in("openjdk version \"1.8.0_151\"\n", None).unwrap();
        assert_eq!(found, v("1.8.0"));
    }

    #[test]
    fn prefers_dotted_over_bare_numbers() {
        let found = Version::find_in("build 42 of exa v0.4.0", None).unwrap();
        assert_eq!(found, v("0.4.0"));
    }

    #[test]
    fn skip_pattern_hides_wrapped_tool_version() {
        let skip = Regex::new("git version .+").unwrap();
        let output = "git version 2.30.1\nhub version 2.14.2\n";
        assert_eq!(Version::find_in(output, Some(&skip)).unwrap(), v("2.14.2"));
        assert_eq!(Version::find_in(output, None).unwrap(), v("2.30.1"));
    }

    #[test]
    fn no_version_in_output() {
        assert!(Version::find_in("usage: fasd [options]", None).is_none());
    }
}
