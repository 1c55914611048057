//! Attack signatures.
//!
//! A [`SignatureSet`] is an ordered list of `(name, predicate)` pairs checked
//! short-circuit. The built-in set covers SQL injection, XSS, command
//! injection, path traversal and LDAP injection. The list is deliberately
//! coarse; it adds friction for obvious probes and is no substitute for a WAF.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

fn compile(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns).expect("built-in signature patterns are valid")
}

static SQL_INJECTION: Lazy<RegexSet> = Lazy::new(|| {
    compile(&[
        r"(?i)\bunion\b[\s\S]*\bselect\b",
        r#"(?i)\b(or|and)\b\s+['"]?\d+['"]?\s*=\s*['"]?\d+"#,
        r#"(?i)'\s*(or|and)\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#,
        r"(?i);\s*(drop|delete|update|insert|truncate|alter)\b",
        r"(?i)\b(drop|truncate)\s+(table|database)\b",
        r"(?i)\b(sleep|benchmark|pg_sleep)\s*\(\s*\d",
        r"(?i)\bwaitfor\s+delay\b",
        r"(?i)\b(exec|execute)\s*\(|\bxp_cmdshell\b",
        r"'\s*(--|#|/\*)",
    ])
});

static XSS: Lazy<RegexSet> = Lazy::new(|| {
    compile(&[
        r"(?i)<\s*script\b",
        r"(?i)<\s*/\s*script\s*>",
        r"(?i)javascript\s*:",
        r"(?i)vbscript\s*:",
        r"(?i)<[^>]+\bon[a-z]+\s*=",
        r"(?i)<\s*(iframe|object|embed|svg|meta)\b",
        r"(?i)data\s*:\s*text/html",
        r"(?i)\bdocument\s*\.\s*(cookie|write|location)",
        r"(?i)\beval\s*\(",
    ])
});

static COMMAND_INJECTION: Lazy<RegexSet> = Lazy::new(|| {
    compile(&[
        r"(?i)[;&|`]\s*(cat|ls|rm|wget|curl|nc|netcat|bash|sh|zsh|whoami|uname|id|chmod|python|perl)\b",
        r"\$\(\s*[a-zA-Z]",
        r"`\s*[a-zA-Z]+[^`]*`",
        r"(?i)/bin/(ba|z|k)?sh\b",
        r"(?i)\b(nc|netcat|ncat)\s+-[elvp]",
        r"2>&1",
    ])
});

static PATH_TRAVERSAL: Lazy<RegexSet> = Lazy::new(|| {
    compile(&[
        r"\.\./",
        r"\.\.\\",
        r"(?i)%2e%2e(%2f|%5c|/|\\)",
        r"(?i)%252e%252e",
        r"(?i)%c0%ae",
        r"\x00|%00",
        r"(?i)/etc/(passwd|shadow|hosts)\b",
        r"(?i)\bc:\\windows\\",
        r"(?i)/proc/self/",
    ])
});

static LDAP_INJECTION: Lazy<RegexSet> = Lazy::new(|| {
    compile(&[
        r"\*\)\s*\(",
        r"\)\s*\(\s*[|&!]",
        r"\(\s*[|&]\s*\(",
        r"(?i)\(\s*(uid|cn|objectclass|mail)\s*=\s*\*",
    ])
});

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

struct Signature {
    name: String,
    predicate: Predicate,
}

/// Ordered, pluggable attack classifier.
pub struct SignatureSet {
    signatures: Vec<Signature>,
}

impl SignatureSet {
    pub fn empty() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    /// The built-in signatures, in evaluation order.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.push("sql_injection", |input| SQL_INJECTION.is_match(input));
        set.push("xss", |input| XSS.is_match(input));
        set.push("command_injection", |input| COMMAND_INJECTION.is_match(input));
        set.push("path_traversal", |input| PATH_TRAVERSAL.is_match(input));
        set.push("ldap_injection", |input| LDAP_INJECTION.is_match(input));
        set
    }

    /// Append a signature evaluated after all existing ones.
    pub fn push<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.signatures.push(Signature {
            name: name.into(),
            predicate: Box::new(predicate),
        });
    }

    /// Append a signature backed by a regular expression.
    pub fn push_regex(&mut self, name: impl Into<String>, pattern: &str) -> Result<(), regex::Error> {
        let regex = Regex::new(pattern)?;
        self.push(name, move |input| regex.is_match(input));
        Ok(())
    }

    /// Name of the first signature matching `input`.
    pub fn first_match(&self, input: &str) -> Option<&str> {
        self.signatures
            .iter()
            .find(|s| (s.predicate)(input))
            .map(|s| s.name.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signatures.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for SignatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
